// SPDX-License-Identifier: MIT

//! Track/condition filtering for module steps and chained prompts.

/// A step's declared track(s) matches the user's selected track when either
/// side is unset, or when the selection appears in the declared set.
pub fn matches_track(declared: Option<&[String]>, selected: Option<&str>) -> bool {
    match (declared, selected) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(tracks), Some(selected)) => tracks.iter().any(|t| t == selected),
    }
}

/// A step's declared condition(s) match when unset, or when every declared
/// condition appears in the user's selected condition set.
pub fn matches_conditions(declared: Option<&[String]>, selected: Option<&[String]>) -> bool {
    match declared {
        None => true,
        Some(required) => {
            let selected = selected.unwrap_or(&[]);
            required.iter().all(|c| selected.contains(c))
        }
    }
}
