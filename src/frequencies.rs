//! Channels and their frequency parametrizations.
//!
//! A two-particle vertex `Γ(v1', v2'; v1, v2)` depends on three independent
//! fermionic frequencies since `v1' + v2' = v1 + v2`.  Each channel trades
//! them for one transfer frequency `w` and two fermionic frequencies
//! `(v, v')`:
//!
//! ```text
//! a:  w = v2' − v1    v1' = v − w/2   v2' = v' + w/2   v1 = v' − w/2
//! p:  w = v1' + v2'   v1' = w/2 + v   v2' = w/2 − v    v1 = w/2 + v'
//! t:  w = v1' − v1    v1' = v' + w/2  v2' = v − w/2    v1 = v' − w/2
//! ```

use std::fmt;

/// Two-particle channel: antiparallel, parallel or transverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
         Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    A,
    P,
    T,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::A, Channel::P, Channel::T];

    pub fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::P => 1,
            Channel::T => 2,
        }
    }

    /// The two other channels.
    pub fn complement(self) -> [Channel; 2] {
        match self {
            Channel::A => [Channel::P, Channel::T],
            Channel::P => [Channel::A, Channel::T],
            Channel::T => [Channel::A, Channel::P],
        }
    }

    /// Sign of the bubble in this channel.
    pub fn sign(self) -> f64 {
        match self {
            Channel::A | Channel::P => 1.0,
            Channel::T => -1.0,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Channel::A => "a",
            Channel::P => "p",
            Channel::T => "t",
        })
    }
}

/// Natural frequencies `(v1', v2', v1)`; `v2` follows from conservation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Natural {
    pub v1p: f64,
    pub v2p: f64,
    pub v1: f64,
}

impl Natural {
    pub fn v2(&self) -> f64 {
        self.v1p + self.v2p - self.v1
    }
}

/// Frequencies `(w, v, v')` of a given channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bosonic {
    pub w: f64,
    pub v: f64,
    pub vp: f64,
}

impl Bosonic {
    pub fn new(w: f64, v: f64, vp: f64) -> Self {
        Self { w, v, vp }
    }
}

/// Convert channel frequencies into natural ones.
pub fn switch2natural(channel: Channel, f: Bosonic) -> Natural {
    let Bosonic { w, v, vp } = f;
    match channel {
        Channel::A => Natural { v1p: v - 0.5 * w, v2p: vp + 0.5 * w, v1: vp - 0.5 * w },
        Channel::P => Natural { v1p: 0.5 * w + v, v2p: 0.5 * w - v, v1: 0.5 * w + vp },
        Channel::T => Natural { v1p: vp + 0.5 * w, v2p: v - 0.5 * w, v1: vp - 0.5 * w },
    }
}

/// Convert natural frequencies into the parametrization of `channel`.
pub fn switch2bosonic(channel: Channel, n: Natural) -> Bosonic {
    let v2 = n.v2();
    match channel {
        Channel::A => Bosonic {
            w: n.v2p - n.v1,
            v: 0.5 * (n.v1p + v2),
            vp: 0.5 * (n.v2p + n.v1),
        },
        Channel::P => Bosonic {
            w: n.v1p + n.v2p,
            v: 0.5 * (n.v1p - n.v2p),
            vp: 0.5 * (n.v1 - v2),
        },
        Channel::T => Bosonic {
            w: n.v1p - n.v1,
            v: 0.5 * (n.v2p + v2),
            vp: 0.5 * (n.v1p + n.v1),
        },
    }
}

/// Re-express frequencies given in channel `from` in channel `to`.
pub fn switch_channel(from: Channel, to: Channel, f: Bosonic) -> Bosonic {
    if from == to {
        return f;
    }
    switch2bosonic(to, switch2natural(from, f))
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use super::*;
    use super::super::utils::Toler;

    const RNG_SEED: [u8; 16] = [
        0x5e, 0x02, 0xb7, 0x19, 0x4d, 0xa0, 0x33, 0x8c,
        0x71, 0xee, 0x26, 0x9f, 0x0a, 0xd4, 0x68, 0x15,
    ];

    #[test]
    fn test_round_trip() {
        let mut rng = XorShiftRng::from_seed(RNG_SEED);
        let toler = Toler { relerr: 1e-14, abserr: 1e-13 };
        for _ in 0..200 {
            let f = Bosonic::new(rng.gen_range(-10.0..10.0),
                                 rng.gen_range(-10.0..10.0),
                                 rng.gen_range(-10.0..10.0));
            for &r in &Channel::ALL {
                let back = switch2bosonic(r, switch2natural(r, f));
                toler_assert_eq!(toler, back.w, f.w);
                toler_assert_eq!(toler, back.v, f.v);
                toler_assert_eq!(toler, back.vp, f.vp);
                for &s in Channel::ALL.iter().filter(|&&s| s != r) {
                    // switching commutes with the natural parametrization
                    let direct = switch_channel(r, s, f);
                    let via = switch2bosonic(s, switch2natural(r, f));
                    assert_eq!(direct, via);
                    let back = switch_channel(s, r, direct);
                    toler_assert_eq!(toler, back.w, f.w);
                    toler_assert_eq!(toler, back.v, f.v);
                    toler_assert_eq!(toler, back.vp, f.vp);
                }
            }
        }
    }

    #[test]
    fn test_transfer_frequencies() {
        let n = Natural { v1p: 1.0, v2p: 2.5, v1: -0.5 };
        assert_eq!(n.v2(), 4.0);
        assert_eq!(switch2bosonic(Channel::A, n).w, 3.0);
        assert_eq!(switch2bosonic(Channel::P, n).w, 3.5);
        assert_eq!(switch2bosonic(Channel::T, n).w, 1.5);
        // self-energy kinematics: (v1', v2'; v1, v2) = (v, v'; v, v')
        let (v, vp) = (0.7, -1.3);
        let n = Natural { v1p: v, v2p: vp, v1: v };
        assert_eq!(switch2bosonic(Channel::A, n).w, vp - v);
        assert_eq!(switch2bosonic(Channel::P, n).w, v + vp);
        assert_eq!(switch2bosonic(Channel::T, n).w, 0.0);
    }
}
