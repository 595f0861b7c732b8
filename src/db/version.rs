/*
 * aurum - AUR helper core for Arch Linux.
 * Copyright (C) 2025  the aurum contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Pacman version comparison: `[epoch:]version[-release]` with rpm-style
//! alphanumeric segment ordering. Matches libalpm's `alpm_pkg_vercmp` so the
//! resolver orders versions the same way the package manager does.

use std::cmp::Ordering;

/// Compare two full pacman version strings.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    match epoch_a.cmp(&epoch_b) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match rpmvercmp(ver_a, ver_b) {
        Ordering::Equal => {}
        ord => return ord,
    }

    // The release is only compared when both versions carry one.
    match (rel_a, rel_b) {
        (Some(ra), Some(rb)) => rpmvercmp(ra, rb),
        _ => Ordering::Equal,
    }
}

/// Split `[epoch:]version[-release]`; a missing epoch counts as 0.
fn split_evr(s: &str) -> (u64, &str, Option<&str>) {
    let (epoch, rest) = match s.split_once(':') {
        Some((e, rest)) if !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit()) => {
            (e.parse().unwrap_or(0), rest)
        }
        _ => (0, s),
    };

    match rest.rsplit_once('-') {
        Some((ver, rel)) => (epoch, ver, Some(rel)),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison of two version fragments.
///
/// Non-alphanumeric runs act as separators; numeric segments order above
/// alphabetic ones and compare as numbers with leading zeros ignored.
fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    while !one.is_empty() && !two.is_empty() {
        one = skip_separators(one);
        two = skip_separators(two);

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg_a, rest_a) = take_segment(one, numeric);
        let (seg_b, rest_b) = take_segment(two, two[0].is_ascii_digit());

        // A numeric segment is always newer than an alphabetic one.
        if numeric != two[0].is_ascii_digit() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let sa = trim_leading_zeros(seg_a);
            let sb = trim_leading_zeros(seg_b);
            sa.len().cmp(&sb.len()).then_with(|| sa.cmp(sb))
        } else {
            seg_a.cmp(seg_b)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        one = rest_a;
        two = rest_b;
    }

    if one.is_empty() && two.is_empty() {
        return Ordering::Equal;
    }

    // One side ran out of segments: a leftover alphabetic segment sorts
    // older than its absence ("1.5b" < "1.5"), a numeric one newer.
    if !one.is_empty() {
        if one[0].is_ascii_alphabetic() {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    } else if two[0].is_ascii_alphabetic() {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|b| !b.is_ascii_alphanumeric()).count();
    &s[n..]
}

fn take_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let n = if numeric {
        s.iter().take_while(|b| b.is_ascii_digit()).count()
    } else {
        s.iter().take_while(|b| b.is_ascii_alphabetic()).count()
    };
    s.split_at(n)
}

fn trim_leading_zeros(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|&&b| b == b'0').count();
    &s[n..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_newer(a: &str, b: &str) {
        assert_eq!(vercmp(a, b), Ordering::Greater, "{} should beat {}", a, b);
        assert_eq!(vercmp(b, a), Ordering::Less, "{} should lose to {}", b, a);
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(vercmp("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(vercmp("1.0-1", "1.0-1"), Ordering::Equal);
        // separators do not matter
        assert_eq!(vercmp("1.0.a", "1.0_a"), Ordering::Equal);
    }

    #[test]
    fn test_basic_ordering() {
        assert_newer("1.0.1", "1.0.0");
        assert_newer("1.10", "1.9");
        assert_newer("2", "1.9.9");
    }

    #[test]
    fn test_numeric_beats_alpha() {
        assert_newer("1.0.1", "1.0.a");
        assert_newer("20220101", "beta");
    }

    #[test]
    fn test_trailing_alpha_is_older() {
        // pacman: 1.5b-1 is older than 1.5-1
        assert_newer("1.5", "1.5b");
        assert_newer("1.5.1", "1.5b");
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(vercmp("1.001", "1.1"), Ordering::Equal);
        assert_newer("1.02", "1.1");
    }

    #[test]
    fn test_epoch_dominates() {
        assert_newer("1:0.1", "9.9");
        assert_newer("2:1.0", "1:9.0");
        assert_eq!(vercmp("0:1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_release_comparison() {
        assert_newer("1.0-2", "1.0-1");
        // release ignored when one side has none
        assert_eq!(vercmp("1.0", "1.0-5"), Ordering::Equal);
    }

    #[test]
    fn test_git_style_versions() {
        assert_newer("r120.abc1234-1", "r119.def5678-1");
        assert_newer("10.8.8-1", "10.8.7-3");
    }
}
