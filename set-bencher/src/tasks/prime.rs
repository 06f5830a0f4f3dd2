//! Deterministic Miller-Rabin primality test for 32-bit integers.

/// Witnesses that make Miller-Rabin exact for every `n < 2^32`.
const WITNESSES: [u64; 3] = [2, 7, 61];

/// Returns whether `n` is prime.
pub fn prime(n: u32) -> bool {
    match n {
        0 | 1 => return false,
        2 | 7 | 61 => return true,
        _ => {}
    }

    // n - 1 = 2^s * d with d odd
    let nm1 = u64::from(n - 1);
    let s = nm1.trailing_zeros();
    let d = nm1 >> s;
    let n = u64::from(n);

    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == nm1 {
            continue;
        }
        for _ in 1..s {
            x = x * x % n;
            if x == 1 {
                return false;
            }
            if x == nm1 {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

/// Computes `base^exp mod modulus` by repeated squaring. `modulus` must fit in 32 bits.
fn pow_mod(base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut result = 1;
    let mut base = base % modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % modulus;
        }
        base = base * base % modulus;
        exp >>= 1;
    }
    result
}
