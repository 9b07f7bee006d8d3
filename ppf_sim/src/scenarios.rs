//! Timeline scenarios run by the harness.

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Steady past view over a fixed population
    Baseline,

    /// Viewer role swaps between Past and Present
    RoleFlip,

    /// Entities spawn and despawn while the past view is up
    SpawnChurn,

    /// One very long frame in the middle of the run
    Stall,

    /// Recorder and viewer come up after the world is already running
    LateJoin,

    /// Delay reaches further back than the history keeps
    Overflow,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::RoleFlip,
            ScenarioId::SpawnChurn,
            ScenarioId::Stall,
            ScenarioId::LateJoin,
            ScenarioId::Overflow,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::RoleFlip => "role_flip",
            ScenarioId::SpawnChurn => "spawn_churn",
            ScenarioId::Stall => "stall",
            ScenarioId::LateJoin => "late_join",
            ScenarioId::Overflow => "overflow",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "8 drifting crates, Past viewer, proxy error vs ground truth",
            ScenarioId::RoleFlip => "Past/Present swap every 2s, proxies toggle without re-creation",
            ScenarioId::SpawnChurn => "spawn every 0.5s, despawn every 0.75s, no orphaned proxies",
            ScenarioId::Stall => "2s frame stall, one sample at the stall, cadence snaps forward",
            ScenarioId::LateJoin => "recorder starts at 1s, viewer spawns at 0.5s, ghost client times out",
            ScenarioId::Overflow => "1s history with 1.5s delay, queries clamp to the oldest sample",
        }
    }

    /// Shortest run that exercises every assertion, counted on top of the
    /// past delay.
    pub fn min_duration_secs(&self) -> f64 {
        match self {
            ScenarioId::Baseline => 1.5,
            ScenarioId::RoleFlip => 4.5,
            ScenarioId::SpawnChurn => 2.5,
            ScenarioId::Stall => 5.5,
            ScenarioId::LateJoin => 2.5,
            ScenarioId::Overflow => 1.5,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" => Ok(ScenarioId::Baseline),
            "role_flip" | "roleflip" => Ok(ScenarioId::RoleFlip),
            "spawn_churn" | "spawnchurn" | "churn" => Ok(ScenarioId::SpawnChurn),
            "stall" => Ok(ScenarioId::Stall),
            "late_join" | "latejoin" => Ok(ScenarioId::LateJoin),
            "overflow" => Ok(ScenarioId::Overflow),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, scenario);
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_aliases_and_case() {
        assert_eq!("RoleFlip".parse::<ScenarioId>().unwrap(), ScenarioId::RoleFlip);
        assert_eq!("churn".parse::<ScenarioId>().unwrap(), ScenarioId::SpawnChurn);
    }

    #[test]
    fn test_unknown_scenario() {
        let err = "time_warp".parse::<ScenarioId>().unwrap_err();
        assert!(matches!(err, SimError::UnknownScenario(ref name) if name == "time_warp"));
    }
}
