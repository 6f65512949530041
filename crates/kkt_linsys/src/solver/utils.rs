pub const EMPTY: isize = -1;

/// Inverse of a permutation given as `perm[new] = old`, so that
/// `pinv[old] = new`. Returns `None` when `perm` is not a bijection on `0..n`.
pub fn inverse_permutation(perm: &[usize]) -> Option<Vec<usize>> {
    let n = perm.len();
    let mut pinv = vec![usize::MAX; n];
    for (new, &old) in perm.iter().enumerate() {
        if old >= n || pinv[old] != usize::MAX {
            return None;
        }
        pinv[old] = new;
    }
    Some(pinv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverts() {
        let perm = [2, 0, 3, 1];
        let pinv = inverse_permutation(&perm).unwrap();
        assert_eq!(pinv, vec![1, 3, 0, 2]);
        for (new, &old) in perm.iter().enumerate() {
            assert_eq!(pinv[old], new);
        }
    }

    #[test]
    fn rejects_repeats_and_out_of_range() {
        assert!(inverse_permutation(&[0, 0, 1]).is_none());
        assert!(inverse_permutation(&[0, 3, 1]).is_none());
        assert_eq!(inverse_permutation(&[]), Some(vec![]));
    }
}
