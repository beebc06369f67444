//! Uniform random selection over candidate slices. Kept as standalone
//! functions taking an injected `Rng` so drawer/answer choice is
//! reproducible under a seeded generator.

use rand::Rng;

/// Pick one element uniformly at random, or `None` if the slice is empty.
pub fn choose<'a, T>(items: &'a [T], rng: &mut impl Rng) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    Some(&items[rng.gen_range(0..items.len())])
}

/// Pick one element uniformly at random among those not equal to `excluded`.
pub fn choose_excluding<'a, T: PartialEq>(
    items: &'a [T],
    excluded: &T,
    rng: &mut impl Rng,
) -> Option<&'a T> {
    let eligible: Vec<&T> = items.iter().filter(|item| *item != excluded).collect();
    if eligible.is_empty() {
        return None;
    }
    Some(eligible[rng.gen_range(0..eligible.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_choose_empty_is_none() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let items: Vec<u32> = vec![];
        assert!(choose(&items, &mut rng).is_none());
    }

    #[test]
    fn test_choose_single() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert_eq!(choose(&[7], &mut rng), Some(&7));
    }

    #[test]
    fn test_choose_is_deterministic_with_seed() {
        let items = [1, 2, 3, 4, 5];
        let a = *choose(&items, &mut rand::rngs::StdRng::seed_from_u64(99)).unwrap();
        let b = *choose(&items, &mut rand::rngs::StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_choose_excluding_skips_excluded() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let items = [1, 2];
        for _ in 0..20 {
            assert_eq!(choose_excluding(&items, &1, &mut rng), Some(&2));
        }
    }

    #[test]
    fn test_choose_excluding_sole_candidate_is_none() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let items = [5];
        assert!(choose_excluding(&items, &5, &mut rng).is_none());
    }

    #[test]
    fn test_choose_excluding_absent_excluded_behaves_like_choose() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let items = [1, 2, 3];
        let picked = choose_excluding(&items, &9, &mut rng).unwrap();
        assert!(items.contains(picked));
    }
}
