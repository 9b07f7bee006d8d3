//! View Selector - which world layer the local camera renders.
//!
//! Exactly one of the direct layer or the proxy layer is visible, plus the
//! UI layer regardless of role. There is no blended state.

use crate::config::LayerConfig;
use crate::error::TimelineError;
use crate::layers::{LayerId, LayerMask, LayerTable};
use crate::role::RoleCell;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    /// Live entities
    Direct,

    /// Past-view proxies
    Proxy,
}

#[derive(Debug, Clone)]
pub struct ViewSelector {
    direct: Option<LayerId>,
    proxy: Option<LayerId>,
    ui: Option<LayerId>,
    mode: ViewMode,
    mask: LayerMask,
}

impl ViewSelector {
    /// Resolves the configured layer names against `table`.
    ///
    /// Missing layers are reported once here; without both world layers the
    /// selector stays on the direct view.
    pub fn new(table: &LayerTable, config: &LayerConfig) -> Self {
        let direct = table.index_of(&config.direct_layer);
        let proxy = table.index_of(&config.proxy_layer);
        let ui = table.index_of(&config.ui_layer);

        let missing: Vec<&str> = [
            (direct, config.direct_layer.as_str()),
            (proxy, config.proxy_layer.as_str()),
            (ui, config.ui_layer.as_str()),
        ]
        .into_iter()
        .filter(|(id, _)| id.is_none())
        .map(|(_, name)| name)
        .collect();

        if !missing.is_empty() {
            warn!(
                "ViewSelector: {}",
                TimelineError::misconfigured(format!("missing layers {:?}", missing))
            );
        }

        let mut selector = Self {
            direct,
            proxy,
            ui,
            mode: ViewMode::Direct,
            mask: LayerMask::EMPTY,
        };
        selector.apply(ViewMode::Direct);
        selector
    }

    /// Per-tick selection from the role signal.
    ///
    /// An unavailable role source selects the direct view.
    pub fn select(&mut self, role: &RoleCell) -> LayerMask {
        let wants_proxy = role.is_delayed() && self.direct.is_some() && self.proxy.is_some();
        let mode = if wants_proxy {
            ViewMode::Proxy
        } else {
            ViewMode::Direct
        };
        self.apply(mode);
        self.mask
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Current camera culling mask.
    pub fn culling_mask(&self) -> LayerMask {
        self.mask
    }

    fn apply(&mut self, mode: ViewMode) {
        let world = match mode {
            ViewMode::Direct => self.direct,
            ViewMode::Proxy => self.proxy,
        };
        self.mode = mode;
        self.mask = LayerMask::EMPTY.with(world).with(self.ui);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn selector() -> (ViewSelector, LayerTable) {
        let config = LayerConfig::default();
        let table = LayerTable::from_config(&config).unwrap();
        (ViewSelector::new(&table, &config), table)
    }

    #[test]
    fn test_past_role_sees_proxies_and_ui() {
        let (mut view, table) = selector();
        let role = RoleCell::with_role(Role::Past);

        let mask = view.select(&role);
        assert_eq!(view.mode(), ViewMode::Proxy);
        assert!(mask.contains(table.index_of("WorldProxy").unwrap()));
        assert!(mask.contains(table.index_of("UI").unwrap()));
        assert!(!mask.contains(table.index_of("WorldReal").unwrap()));
    }

    #[test]
    fn test_other_roles_see_direct() {
        let (mut view, table) = selector();
        for role in [Role::None, Role::Present, Role::Future] {
            let mask = view.select(&RoleCell::with_role(role));
            assert_eq!(view.mode(), ViewMode::Direct);
            assert!(mask.contains(table.index_of("WorldReal").unwrap()));
            assert!(!mask.contains(table.index_of("WorldProxy").unwrap()));
            assert!(mask.contains(table.index_of("UI").unwrap()));
        }
    }

    #[test]
    fn test_unavailable_source_falls_back_to_direct() {
        let (mut view, _) = selector();
        let role = RoleCell::with_role(Role::Past);
        view.select(&role);
        assert_eq!(view.mode(), ViewMode::Proxy);

        role.clear();
        view.select(&role);
        assert_eq!(view.mode(), ViewMode::Direct);
    }

    #[test]
    fn test_missing_proxy_layer_degrades_to_direct() {
        let config = LayerConfig::default();
        let mut table = LayerTable::new();
        let real = table.define("WorldReal").unwrap();
        let ui = table.define("UI").unwrap();

        let mut view = ViewSelector::new(&table, &config);
        let mask = view.select(&RoleCell::with_role(Role::Past));

        assert_eq!(view.mode(), ViewMode::Direct);
        assert_eq!(mask, LayerMask::of(real).with(Some(ui)));
    }
}
