use crate::capture::Rgb;
use crate::config::{GameConfig, PixelSpec};
use crate::phase::Phase;

/// One exact-position color expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelProbe {
    pub x: u32,
    pub y: u32,
    pub color: Rgb,
}

impl From<PixelSpec> for PixelProbe {
    fn from((x, y, r, g, b): PixelSpec) -> Self {
        Self { x, y, color: Rgb::new(r, g, b) }
    }
}

/// Probes that must all match (AND) for the group to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureGroup {
    probes: Vec<PixelProbe>,
}

impl SignatureGroup {
    pub fn new(probes: Vec<PixelProbe>) -> Self {
        Self { probes }
    }

    pub fn probes(&self) -> &[PixelProbe] {
        &self.probes
    }
}

/// A phase and its alternative signature groups (OR).
#[derive(Debug, Clone)]
pub struct PhaseSignature {
    pub phase: Phase,
    pub groups: Vec<SignatureGroup>,
}

/// Identity of a trackable game plus its phase signatures in declared order.
#[derive(Debug, Clone)]
pub struct GameProfile {
    pub name: String,
    /// Lowercased executable names. A leading `*` matches by suffix.
    pub process_names: Vec<String>,
    /// Lowercased window-title substring.
    pub title_substring: String,
    pub short_name: String,
    pub phases: Vec<PhaseSignature>,
}

impl GameProfile {
    pub fn from_config(game: &GameConfig) -> Self {
        Self {
            name: game.name.clone(),
            process_names: game
                .processes
                .to_vec()
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            title_substring: game.title.to_lowercase(),
            short_name: game.shortname.trim().to_string(),
            phases: game
                .phases
                .iter()
                .map(|phase| PhaseSignature {
                    phase: Phase::from_label(&phase.name),
                    groups: phase
                        .groups
                        .iter()
                        .map(|g| SignatureGroup::new(g.iter().copied().map(PixelProbe::from).collect()))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Case-insensitive process membership and title containment.
    pub fn matches_context(&self, process_name: &str, window_title: &str) -> bool {
        let process = process_name.to_lowercase();
        let title = window_title.to_lowercase();
        let process_ok = self.process_names.iter().any(|candidate| match candidate.strip_prefix('*') {
            Some(suffix) => process.ends_with(suffix),
            None => *candidate == process,
        });
        process_ok && title.contains(&self.title_substring)
    }

    /// Token used in kept clip names and subfolders.
    pub fn file_token(&self) -> String {
        self.short_name.to_uppercase()
    }
}

/// Loaded-once table of game profiles, searched in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: Vec<GameProfile>,
}

/// Counts logged at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub games: usize,
    pub phases: usize,
    pub signature_groups: usize,
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<GameProfile>) -> Self {
        Self { profiles }
    }

    pub fn from_config(games: &[GameConfig]) -> Self {
        Self::new(games.iter().map(GameProfile::from_config).collect())
    }

    /// First profile (in declaration order) matching the foreground context.
    pub fn find(&self, process_name: &str, window_title: &str) -> Option<&GameProfile> {
        self.profiles
            .iter()
            .find(|profile| profile.matches_context(process_name, window_title))
    }

    pub fn profiles(&self) -> &[GameProfile] {
        &self.profiles
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            games: self.profiles.len(),
            phases: self.profiles.iter().map(|p| p.phases.len()).sum(),
            signature_groups: self
                .profiles
                .iter()
                .flat_map(|p| p.phases.iter())
                .map(|phase| phase.groups.len())
                .sum(),
        }
    }
}
