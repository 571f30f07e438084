//! Team selection for dispatch.
//!
//! Dispatch asks a [`TeamSelector`] which team should respond to an
//! incident at a given location. [`FixedTeamSelector`] ignores the
//! location and always names the same team.

use thiserror::Error;

/// Team sent when no better choice is available.
pub const DEFAULT_TEAM: &str = "Team Charlie (S&R)";

/// Chooses the team to dispatch for an incident location.
pub trait TeamSelector: Send + Sync {
    /// Returns the name of the team to dispatch.
    fn select_team(&self, latitude: Option<f64>, longitude: Option<f64>) -> String;
}

impl<F> TeamSelector for F
where
    F: Fn(Option<f64>, Option<f64>) -> String + Send + Sync,
{
    fn select_team(&self, latitude: Option<f64>, longitude: Option<f64>) -> String {
        self(latitude, longitude)
    }
}

/// A team name was empty or only whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Team name must not be blank")]
pub struct BlankTeamError;

/// Always selects the same team.
#[derive(Debug, Clone)]
pub struct FixedTeamSelector {
    team: String,
}

impl FixedTeamSelector {
    /// Creates a selector that always returns `team`, trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`BlankTeamError`] if `team` is blank.
    pub fn new(team: &str) -> Result<Self, BlankTeamError> {
        let team = team.trim();
        if team.is_empty() {
            return Err(BlankTeamError);
        }
        Ok(Self {
            team: team.to_string(),
        })
    }
}

impl Default for FixedTeamSelector {
    fn default() -> Self {
        Self {
            team: DEFAULT_TEAM.to_string(),
        }
    }
}

impl TeamSelector for FixedTeamSelector {
    fn select_team(&self, latitude: Option<f64>, longitude: Option<f64>) -> String {
        log::debug!(
            "Selecting {} for location ({latitude:?}, {longitude:?})",
            self.team
        );
        self.team.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_selector_trims_and_rejects_blank_names() {
        let selector = FixedTeamSelector::new("  Team Alpha (Medical) ").unwrap();
        assert_eq!(selector.select_team(None, None), "Team Alpha (Medical)");

        assert_eq!(FixedTeamSelector::new("").unwrap_err(), BlankTeamError);
        assert_eq!(FixedTeamSelector::new(" \t ").unwrap_err(), BlankTeamError);
    }

    #[test]
    fn fixed_selector_ignores_location() {
        let selector = FixedTeamSelector::default();
        assert_eq!(selector.select_team(None, None), DEFAULT_TEAM);
        assert_eq!(selector.select_team(Some(38.9), Some(-77.0)), DEFAULT_TEAM);
    }

    #[test]
    fn closures_are_selectors() {
        let selector = |lat: Option<f64>, _lon: Option<f64>| {
            if lat.is_some() {
                "Team Alpha (Medical)".to_string()
            } else {
                DEFAULT_TEAM.to_string()
            }
        };
        assert_eq!(selector.select_team(Some(1.0), None), "Team Alpha (Medical)");
        assert_eq!(selector.select_team(None, None), DEFAULT_TEAM);
    }
}
