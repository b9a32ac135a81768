//! Pairwise coupling of Hastie and Tibshirani
//!
//! Finds class probabilities `p` whose pairwise ratios `p_i / (p_i + p_j)`
//! agree, in the weighted Kullback-Leibler sense, with the pairwise
//! estimates `r[i][j]` carrying weights `n[i][j]`.

/// Change of any probability below which the fixed point is reached
const CONVERGENCE: f64 = 1e-3;
const MAX_ITERATIONS: usize = 1000;

/// Couple upper-triangular pairwise estimates into one distribution
///
/// `r[i][j]` (for `i < j`) is the probability of class `i` given that the
/// class is `i` or `j`; `n[i][j]` is the weight of that estimate. Both are
/// `K x K`; entries on and below the diagonal are ignored.
pub fn pairwise_coupling(n: &[Vec<f64>], r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }
    let mut p = vec![1.0 / k as f64; k];
    let mut u = vec![vec![0.5; k]; k];

    let mut first_sum = vec![0.0; k];
    for i in 0..k {
        for j in (i + 1)..k {
            first_sum[i] += n[i][j] * r[i][j];
            first_sum[j] += n[i][j] * (1.0 - r[i][j]);
        }
    }

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;

        let mut second_sum = vec![0.0; k];
        for i in 0..k {
            for j in (i + 1)..k {
                second_sum[i] += n[i][j] * u[i][j];
                second_sum[j] += n[i][j] * (1.0 - u[i][j]);
            }
        }

        for i in 0..k {
            if first_sum[i] == 0.0 || second_sum[i] == 0.0 {
                if p[i] > 0.0 {
                    changed = true;
                }
                p[i] = 0.0;
            } else {
                let old = p[i];
                p[i] *= first_sum[i] / second_sum[i];
                if (old - p[i]).abs() > CONVERGENCE {
                    changed = true;
                }
            }
        }

        let total: f64 = p.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return vec![1.0 / k as f64; k];
        }
        p.iter_mut().for_each(|v| *v /= total);

        for i in 0..k {
            for j in (i + 1)..k {
                let denom = p[i] + p[j];
                if denom > 0.0 {
                    u[i][j] = p[i] / denom;
                }
            }
        }

        if !changed {
            break;
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix(k: usize, entries: &[(usize, usize, f64)]) -> Vec<Vec<f64>> {
        let mut m = vec![vec![0.0; k]; k];
        for &(i, j, v) in entries {
            m[i][j] = v;
        }
        m
    }

    #[test]
    fn test_consistent_estimates_are_recovered() {
        // p = (0.5, 0.3, 0.2)
        let r = matrix(3, &[(0, 1, 0.5 / 0.8), (0, 2, 0.5 / 0.7), (1, 2, 0.3 / 0.5)]);
        let n = matrix(3, &[(0, 1, 10.0), (0, 2, 10.0), (1, 2, 10.0)]);
        let p = pairwise_coupling(&n, &r);

        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-2);
        assert_relative_eq!(p[1], 0.3, epsilon = 1e-2);
        assert_relative_eq!(p[2], 0.2, epsilon = 1e-2);
    }

    #[test]
    fn test_even_estimates_give_uniform() {
        let r = matrix(4, &[(0, 1, 0.5), (0, 2, 0.5), (0, 3, 0.5), (1, 2, 0.5), (1, 3, 0.5), (2, 3, 0.5)]);
        let n = matrix(4, &[(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0), (1, 2, 1.0), (1, 3, 1.0), (2, 3, 1.0)]);
        for v in pairwise_coupling(&n, &r) {
            assert_relative_eq!(v, 0.25, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_dominant_class_wins() {
        let r = matrix(3, &[(0, 1, 0.05), (0, 2, 0.5), (1, 2, 0.95)]);
        let n = matrix(3, &[(0, 1, 20.0), (0, 2, 20.0), (1, 2, 20.0)]);
        let p = pairwise_coupling(&n, &r);
        assert!(p[1] > p[0] && p[1] > p[2]);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let r = matrix(3, &[(0, 1, 0.9), (0, 2, 0.9), (1, 2, 0.9)]);
        let n = matrix(3, &[]);
        assert_eq!(pairwise_coupling(&n, &r), vec![1.0 / 3.0; 3]);
    }
}
