//! Polynomials over named size parameters with exact coefficients.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use amor_common::Rational;
use num_traits::{One, Signed, Zero};

/// A product of size parameters, sorted by name, exponents positive.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Monomial(Vec<(String, u32)>);

impl Monomial {
    pub fn one() -> Monomial {
        Monomial::default()
    }

    pub fn var(name: &str) -> Monomial {
        Monomial(vec![(name.to_string(), 1)])
    }

    pub fn degree(&self) -> u32 {
        self.0.iter().map(|(_, e)| e).sum()
    }

    pub fn factors(&self) -> &[(String, u32)] {
        &self.0
    }

    fn mul(&self, other: &Monomial) -> Monomial {
        let mut exps: BTreeMap<String, u32> = self.0.iter().cloned().collect();
        for (name, e) in &other.0 {
            *exps.entry(name.clone()).or_insert(0) += e;
        }
        Monomial(exps.into_iter().collect())
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "1");
        }
        for (i, (name, e)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }
            if *e == 1 {
                write!(f, "{}", name)?;
            } else {
                write!(f, "{}^{}", name, e)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, Rational>,
}

impl Polynomial {
    pub fn zero() -> Polynomial {
        Polynomial::default()
    }

    pub fn constant(c: Rational) -> Polynomial {
        let mut p = Polynomial::zero();
        p.add_term(Monomial::one(), c);
        p
    }

    pub fn var(name: &str) -> Polynomial {
        let mut p = Polynomial::zero();
        p.add_term(Monomial::var(name), Rational::one());
        p
    }

    /// `C(n, k)` as the falling factorial `n(n−1)…(n−k+1) / k!`.
    pub fn binomial(name: &str, k: u32) -> Polynomial {
        let mut p = Polynomial::constant(Rational::one());
        for j in 0..k {
            let factor = Polynomial::var(name).add(&Polynomial::constant(-Rational::from_integer(j.into())));
            p = p.mul(&factor);
        }
        let factorial = (1..=k).fold(Rational::one(), |acc, j| acc * Rational::from_integer(j.into()));
        p.scale(&(Rational::one() / factorial))
    }

    pub fn add_term(&mut self, monomial: Monomial, coeff: Rational) {
        let entry = self.terms.entry(monomial.clone()).or_insert_with(Rational::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.remove(&monomial);
        }
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }

    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                out.add_term(m1.mul(m2), c1 * c2);
            }
        }
        out
    }

    pub fn scale(&self, factor: &Rational) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m, c) in &self.terms {
            out.add_term(m.clone(), c * factor);
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.degree() == 0
    }

    /// Highest total degree; 0 for constants and for zero.
    pub fn degree(&self) -> u32 {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    pub fn coefficient(&self, monomial: &Monomial) -> Rational {
        self.terms.get(monomial).cloned().unwrap_or_else(Rational::zero)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Rational)> {
        self.terms.iter()
    }

    /// Size parameters occurring in the polynomial.
    pub fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .terms
            .keys()
            .flat_map(|m| m.0.iter().map(|(n, _)| n.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Value at the given sizes; missing sizes count as 0.
    pub fn eval(&self, sizes: &BTreeMap<String, Rational>) -> Rational {
        let mut total = Rational::zero();
        for (m, c) in &self.terms {
            let mut term = c.clone();
            for (name, e) in &m.0 {
                let size = sizes.get(name).cloned().unwrap_or_else(Rational::zero);
                for _ in 0..*e {
                    term *= &size;
                }
            }
            total += term;
        }
        total
    }
}

impl fmt::Display for Polynomial {
    /// Highest degree first, e.g. `1/2*|xs|^2 + 1/2*|xs| + 3`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        let mut terms: Vec<(&Monomial, &Rational)> = self.terms.iter().collect();
        terms.sort_by_key(|(m, _)| (Reverse(m.degree()), *m));
        for (i, (m, c)) in terms.into_iter().enumerate() {
            let magnitude = c.abs();
            match (i, c.is_negative()) {
                (0, true) => write!(f, "-")?,
                (0, false) => {}
                (_, true) => write!(f, " - ")?,
                (_, false) => write!(f, " + ")?,
            }
            if m.0.is_empty() {
                write!(f, "{}", magnitude)?;
            } else if magnitude.is_one() {
                write!(f, "{}", m)?;
            } else {
                write!(f, "{}*{}", magnitude, m)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amor_common::rational::{int, ratio};

    #[test]
    fn binomials_expand_to_falling_factorials() {
        assert_eq!(Polynomial::binomial("|n|", 0).to_string(), "1");
        assert_eq!(Polynomial::binomial("|n|", 1).to_string(), "|n|");
        assert_eq!(Polynomial::binomial("|n|", 2).to_string(), "1/2*|n|^2 - 1/2*|n|");
        let c3 = Polynomial::binomial("|n|", 3);
        let sizes: BTreeMap<String, Rational> = [("|n|".to_string(), int(5))].into_iter().collect();
        assert_eq!(c3.eval(&sizes), int(10));
        assert_eq!(c3.degree(), 3);
    }

    #[test]
    fn arithmetic_cancels_and_multiplies() {
        let xs = Polynomial::var("|xs|");
        let ys = Polynomial::var("|ys|");
        let p = xs.add(&ys).mul(&xs).add(&Polynomial::constant(int(3)));
        assert_eq!(p.to_string(), "|xs|*|ys| + |xs|^2 + 3");
        assert_eq!(p.parameters(), vec!["|xs|", "|ys|"]);
        let q = p.add(&p.scale(&int(-1)));
        assert!(q.is_zero());
        assert!(q.is_constant());
        assert_eq!(
            xs.scale(&ratio(3, 2)).coefficient(&Monomial::var("|xs|")),
            ratio(3, 2)
        );
    }
}
