//! Dense direct solve for the small reduced constraint system.

use crate::float::Float;

/// Solves `A·x = b` in place by Gaussian elimination with partial pivoting.
///
/// `a` is row-major `n×n` and is destroyed; `b` becomes the solution.
/// `regularization` is added to every diagonal entry before elimination, and
/// any pivot whose magnitude falls below `pivot_floor` is replaced by
/// `±pivot_floor` (keeping its sign). The system is not assumed symmetric.
pub fn solve_in_place<F: Float>(a: &mut [F], b: &mut [F], n: usize, regularization: F, pivot_floor: F) {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n);

    for i in 0..n {
        a[i * n + i] += regularization;
    }

    for col in 0..n {
        let mut pivot_row = col;
        let mut best = a[col * n + col].abs();
        for row in col + 1..n {
            let candidate = a[row * n + col].abs();
            if candidate > best {
                best = candidate;
                pivot_row = row;
            }
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        let mut pivot = a[col * n + col];
        if pivot.abs() < pivot_floor {
            pivot = if pivot < F::zero() { -pivot_floor } else { pivot_floor };
            a[col * n + col] = pivot;
        }

        for row in col + 1..n {
            let factor = a[row * n + col] / pivot;
            if factor == F::zero() {
                continue;
            }
            a[row * n + col] = F::zero();
            for k in col + 1..n {
                let upper = a[col * n + k];
                a[row * n + k] -= factor * upper;
            }
            let rhs = b[col];
            b[row] -= factor * rhs;
        }
    }

    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row * n + k] * b[k];
        }
        b[row] = sum / a[row * n + row];
    }
}
