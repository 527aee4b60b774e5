use crate::gilib::{GenoError, Result};
use itertools::Itertools;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, PoisonError, RwLock},
};

lazy_static::lazy_static! {
    /// Single-letter alleles, one instance per letter for the process lifetime
    static ref BASE_POOL: RwLock<HashMap<char, Allele>> = RwLock::new(HashMap::new());
    /// Every ordered allele combination handed out by AlleleSet::of
    static ref SET_POOL: RwLock<HashMap<Vec<Allele>, Arc<AlleleSet>>> = RwLock::new(HashMap::new());
}

/// One allele: a single base or an arbitrary token (indel sequence, `<DEL>`, ...)
#[derive(Clone)]
pub struct Allele(Arc<str>);

impl Allele {
    /// Single-character tokens come from the shared pool, anything longer is
    /// a fresh value
    pub fn of(token: &str) -> Allele {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Allele::base(c),
            _ => Allele(Arc::from(token)),
        }
    }

    pub fn base(c: char) -> Allele {
        if let Some(allele) = BASE_POOL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&c)
        {
            return allele.clone();
        }
        // pool is append-only, so a poisoned lock still holds consistent entries
        let mut pool = BASE_POOL.write().unwrap_or_else(PoisonError::into_inner);
        pool.entry(c)
            .or_insert_with(|| Allele(Arc::from(c.to_string())))
            .clone()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_char(&self) -> Option<char> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn is_snp_allele(&self) -> bool {
        self.as_char().is_some()
    }

    /// Symbolic ALT of the form `<TYPE>`
    pub fn is_symbolic(&self) -> bool {
        self.0.len() > 2 && self.0.starts_with('<') && self.0.ends_with('>')
    }

    /// True when both handles point at the same pooled instance
    pub fn same_instance(&self, other: &Allele) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Watson-Crick complement. Single letters other than ACGT map to themselves.
    pub fn complement(&self) -> Result<Allele> {
        let c = self
            .as_char()
            .ok_or_else(|| GenoError::NotASnp(self.0.to_string()))?;
        Ok(Allele::base(complement_base(c)))
    }
}

fn complement_base(c: char) -> char {
    match c {
        'A' => 'T',
        'T' => 'A',
        'C' => 'G',
        'G' => 'C',
        'a' => 't',
        't' => 'a',
        'c' => 'g',
        'g' => 'c',
        other => other,
    }
}

impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other) || self.0 == other.0
    }
}

impl Eq for Allele {}

impl Hash for Allele {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allele({})", self.0)
    }
}

/// All observed alleles of a variant in order; element 0 is the reference
/// when the source defines one
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AlleleSet {
    alleles: Vec<Allele>,
}

impl AlleleSet {
    /// Returns the pooled instance for this exact ordered sequence of tokens
    pub fn of<S: AsRef<str>>(tokens: &[S]) -> Arc<AlleleSet> {
        AlleleSet::from_alleles(tokens.iter().map(|t| Allele::of(t.as_ref())).collect())
    }

    pub fn from_chars(bases: &[char]) -> Arc<AlleleSet> {
        AlleleSet::from_alleles(bases.iter().map(|&c| Allele::base(c)).collect())
    }

    pub fn from_alleles(alleles: Vec<Allele>) -> Arc<AlleleSet> {
        if let Some(set) = SET_POOL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alleles.as_slice())
        {
            return Arc::clone(set);
        }
        let mut pool = SET_POOL.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            pool.entry(alleles.clone())
                .or_insert_with(|| Arc::new(AlleleSet { alleles })),
        )
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Allele> {
        self.alleles.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&Allele> {
        self.alleles.get(idx)
    }

    pub fn first(&self) -> Option<&Allele> {
        self.alleles.first()
    }

    pub fn contains(&self, allele: &Allele) -> bool {
        self.alleles.contains(allele)
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.alleles.iter().map(Allele::as_str).collect()
    }

    /// Distinct alleles in first-seen order
    pub fn distinct(&self) -> Vec<Allele> {
        self.alleles.iter().unique().cloned().collect()
    }

    /// Order-independent comparison; duplicate entries collapse
    pub fn same_alleles(&self, other: &AlleleSet) -> bool {
        let mine: HashSet<&Allele> = self.alleles.iter().collect();
        let theirs: HashSet<&Allele> = other.alleles.iter().collect();
        mine == theirs
    }

    pub fn is_snp(&self) -> bool {
        self.alleles.len() >= 2 && self.alleles.iter().all(Allele::is_snp_allele)
    }

    pub fn is_biallelic(&self) -> bool {
        self.distinct().len() == 2
    }

    /// SNP whose two distinct bases are A/T or G/C, so the strand cannot be
    /// told from the alleles alone
    pub fn is_at_or_gc_snp(&self) -> bool {
        if !self.is_snp() {
            return false;
        }
        let bases: HashSet<char> = self
            .alleles
            .iter()
            .filter_map(Allele::as_char)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if bases.len() != 2 {
            return false;
        }
        (bases.contains(&'A') && bases.contains(&'T'))
            || (bases.contains(&'G') && bases.contains(&'C'))
    }

    /// Complement every element, keeping order and multiplicity
    pub fn complement(&self) -> Result<Arc<AlleleSet>> {
        let flipped = self
            .alleles
            .iter()
            .map(Allele::complement)
            .collect::<Result<Vec<_>>>()
            .map_err(|_| GenoError::NotASnp(self.to_string()))?;
        Ok(AlleleSet::from_alleles(flipped))
    }

    pub fn as_chars(&self) -> Result<Vec<char>> {
        self.alleles
            .iter()
            .map(|a| a.as_char().ok_or_else(|| GenoError::NotASnp(self.to_string())))
            .collect()
    }

    /// Same alleles with the first copy of `first` moved to the front, keeping
    /// multiplicity. None if `first` isn't a member.
    pub fn with_first(&self, first: &Allele) -> Option<Arc<AlleleSet>> {
        let idx = self.alleles.iter().position(|a| a == first)?;
        let mut reordered = self.alleles.clone();
        let moved = reordered.remove(idx);
        reordered.insert(0, moved);
        Some(AlleleSet::from_alleles(reordered))
    }
}

impl fmt::Display for AlleleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alleles.iter().join(","))
    }
}

impl fmt::Debug for AlleleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlleleSet[{}]", self)
    }
}

impl<'a> IntoIterator for &'a AlleleSet {
    type Item = &'a Allele;
    type IntoIter = std::slice::Iter<'a, Allele>;

    fn into_iter(self) -> Self::IntoIter {
        self.alleles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_base_alleles_share_instance() {
        let a = Allele::of("A");
        let b = Allele::base('A');
        assert!(a.same_instance(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_long_alleles_compare_by_value() {
        let a = Allele::of("ACG");
        let b = Allele::of("ACG");
        assert!(!a.same_instance(&b));
        assert_eq!(a, b);
        assert!(!a.is_snp_allele());
    }

    #[test]
    fn test_sets_are_interned() {
        let first = AlleleSet::of(&["A", "T"]);
        let second = AlleleSet::of(&["A", "T"]);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &AlleleSet::from_chars(&['A', 'T'])));
    }

    #[test]
    fn test_order_gives_distinct_instances() {
        let ag = AlleleSet::of(&["A", "G"]);
        let ga = AlleleSet::of(&["G", "A"]);
        assert!(!Arc::ptr_eq(&ag, &ga));
        assert_ne!(*ag, *ga);
        assert!(ag.same_alleles(&ga));
    }

    #[rstest]
    #[case(&["A", "G"], &["T", "G"], false)]
    #[case(&["A", "G"], &["G", "A"], true)]
    #[case(&["A", "G"], &["A", "G", "T"], false)]
    #[case(&["A", "G"], &["A"], false)]
    #[case(&["A", "G"], &["A", "G"], true)]
    #[case(&["A", "G", "G"], &["G", "A"], true)]
    fn test_same_alleles(#[case] a: &[&str], #[case] b: &[&str], #[case] expected: bool) {
        assert_eq!(AlleleSet::of(a).same_alleles(&AlleleSet::of(b)), expected);
    }

    #[rstest]
    #[case(&["A", "G"], false)]
    #[case(&["G", "C"], true)]
    #[case(&["A", "T"], true)]
    #[case(&["G", "C", "GC"], false)]
    #[case(&["G", "C", "G"], true)]
    #[case(&["G", "C", "T"], false)]
    #[case(&["A"], false)]
    fn test_is_at_or_gc_snp(#[case] tokens: &[&str], #[case] expected: bool) {
        assert_eq!(AlleleSet::of(tokens).is_at_or_gc_snp(), expected);
    }

    #[test]
    fn test_complement_keeps_order() {
        let swapped = AlleleSet::of(&["A", "T", "C", "G"]).complement().unwrap();
        assert_eq!(swapped.tokens(), vec!["T", "A", "G", "C"]);
        assert_eq!(swapped.as_chars().unwrap(), vec!['T', 'A', 'G', 'C']);
    }

    #[test]
    fn test_complement_snp() {
        let swapped = AlleleSet::from_chars(&['A', 'G']).complement().unwrap();
        assert_eq!(swapped.tokens(), vec!["T", "C"]);
    }

    #[rstest]
    #[case('A')]
    #[case('C')]
    #[case('G')]
    #[case('T')]
    #[case('N')]
    fn test_double_complement(#[case] base: char) {
        let set = AlleleSet::from_chars(&[base]);
        let back = set.complement().unwrap().complement().unwrap();
        assert!(back.same_alleles(&set));
    }

    #[test]
    fn test_non_snp_views_fail() {
        let set = AlleleSet::of(&["A", "T", "CG"]);
        assert!(matches!(set.as_chars(), Err(GenoError::NotASnp(_))));
        assert!(matches!(set.complement(), Err(GenoError::NotASnp(_))));
        assert!(!set.is_snp());
    }

    #[test]
    fn test_as_chars() {
        let set = AlleleSet::from_chars(&['C', 'A']);
        assert_eq!(set.as_chars().unwrap(), vec!['C', 'A']);
        assert_eq!(set.get(0).unwrap().as_str(), "C");
    }

    #[test]
    fn test_with_first() {
        let set = AlleleSet::of(&["A", "C", "G"]);
        let moved = set.with_first(&Allele::of("G")).unwrap();
        assert_eq!(moved.tokens(), vec!["G", "A", "C"]);
        assert!(set.with_first(&Allele::of("T")).is_none());
    }

    #[rstest]
    #[case("C", &["C", "G", "G"])]
    #[case("G", &["G", "C", "G"])]
    fn test_with_first_keeps_duplicates(#[case] first: &str, #[case] expected: &[&str]) {
        let set = AlleleSet::of(&["G", "C", "G"]);
        assert_eq!(set.with_first(&Allele::of(first)).unwrap().tokens(), expected);
    }

    #[test]
    fn test_concurrent_interning() {
        let sets: Vec<Arc<AlleleSet>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| AlleleSet::from_chars(&['T', 'W', 'Q'])))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for set in &sets[1..] {
            assert!(Arc::ptr_eq(&sets[0], set));
            assert!(set.get(1).unwrap().same_instance(&Allele::base('W')));
        }
        assert!(Arc::ptr_eq(&sets[0], &AlleleSet::of(&["T", "W", "Q"])));
    }

    #[test]
    fn test_snp_and_biallelic() {
        assert!(AlleleSet::of(&["A", "C"]).is_snp());
        assert!(!AlleleSet::of(&["A"]).is_snp());
        assert!(AlleleSet::of(&["A", "C", "A"]).is_biallelic());
        assert!(!AlleleSet::of(&["A", "C", "G"]).is_biallelic());
        assert!(Allele::of("<DEL>").is_symbolic());
    }
}
