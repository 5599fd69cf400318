use crate::db::core::Side;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub autoroute: AutorouteConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    #[serde(default = "default_step_cost")]
    pub step_cost: u32,
    #[serde(default = "default_turn_penalty")]
    pub turn_penalty: u32,
    #[serde(default = "default_window_margin")]
    pub window_margin: i32,
    #[serde(default = "default_max_expansions")]
    pub max_expansions: u32,
    #[serde(default = "default_support_spacing")]
    pub support_spacing: i32,
    #[serde(default = "default_net_epsilon")]
    pub net_epsilon: f64,
    #[serde(default = "default_prefer_bridges")]
    pub prefer_bridges: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            step_cost: default_step_cost(),
            turn_penalty: default_turn_penalty(),
            window_margin: default_window_margin(),
            max_expansions: default_max_expansions(),
            support_spacing: default_support_spacing(),
            net_epsilon: default_net_epsilon(),
            prefer_bridges: default_prefer_bridges(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    /// Pack connected parts tightly to shorten routing.
    #[default]
    Wirelength,
    /// Uniform orientation, wider gaps, aligned rows for hand soldering.
    Solderability,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlacementConfig {
    #[serde(default)]
    pub mode: PlacementMode,
    #[serde(default = "default_wirelength_spacing")]
    pub wirelength_spacing: i32,
    #[serde(default = "default_solder_spacing")]
    pub solder_spacing: i32,
    #[serde(default = "default_search_radius")]
    pub search_radius: i32,
    #[serde(default = "default_row_weight")]
    pub row_weight: f64,
    #[serde(default = "default_wirelength_weight")]
    pub wirelength_weight: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            mode: PlacementMode::default(),
            wirelength_spacing: default_wirelength_spacing(),
            solder_spacing: default_solder_spacing(),
            search_radius: default_search_radius(),
            row_weight: default_row_weight(),
            wirelength_weight: default_wirelength_weight(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetOrdering {
    #[default]
    ShortestFirst,
    FewestPinsFirst,
    Given,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutorouteConfig {
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
    #[serde(default)]
    pub clear_existing: bool,
    #[serde(default)]
    pub ordering: NetOrdering,
    #[serde(default = "default_use_bridges")]
    pub use_bridges: bool,
    #[serde(default)]
    pub side: Side,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for AutorouteConfig {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
            clear_existing: false,
            ordering: NetOrdering::default(),
            use_bridges: default_use_bridges(),
            side: Side::default(),
            seed: default_seed(),
        }
    }
}

/// Which optional repair passes run after connected paths are rerouted.
#[derive(Debug, Deserialize, Clone)]
pub struct RepairConfig {
    #[serde(default = "default_true")]
    pub synthesize_pull_apart: bool,
    #[serde(default = "default_true")]
    pub reroute_blocked: bool,
    #[serde(default = "default_true")]
    pub reroute_overlaps: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            synthesize_pull_apart: true,
            reroute_blocked: true,
            reroute_overlaps: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_project_file")]
    pub project_file: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_render_png")]
    pub render_png: bool,
    #[serde(default = "default_pixel_pitch")]
    pub pixel_pitch: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            project_file: default_project_file(),
            output_file: default_output_file(),
            render_png: default_render_png(),
            pixel_pitch: default_pixel_pitch(),
        }
    }
}

fn default_step_cost() -> u32 {
    1
}

fn default_turn_penalty() -> u32 {
    5
}

fn default_window_margin() -> i32 {
    8
}

fn default_max_expansions() -> u32 {
    400_000
}

fn default_support_spacing() -> i32 {
    0
}

fn default_net_epsilon() -> f64 {
    0.25
}

fn default_prefer_bridges() -> bool {
    true
}

fn default_wirelength_spacing() -> i32 {
    1
}

fn default_solder_spacing() -> i32 {
    2
}

fn default_search_radius() -> i32 {
    64
}

fn default_row_weight() -> f64 {
    2.0
}

fn default_wirelength_weight() -> f64 {
    1.0
}

fn default_max_passes() -> usize {
    3
}

fn default_use_bridges() -> bool {
    true
}

fn default_seed() -> u64 {
    0x5eed
}

fn default_true() -> bool {
    true
}

fn default_project_file() -> String {
    "inputs/board.toml".to_string()
}

fn default_output_file() -> String {
    "output/board.toml".to_string()
}

fn default_render_png() -> bool {
    true
}

fn default_pixel_pitch() -> f64 {
    10.0
}
