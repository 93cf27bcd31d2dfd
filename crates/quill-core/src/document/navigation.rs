use log::debug;

use super::{Document, NodeKey};
use crate::route::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    /// Middle button, delivered on mouse-up
    Auxiliary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    /// Node under the pointer
    pub target: NodeKey,
    pub button: MouseButton,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Not a link click; the default behavior applies
    Ignored,
    /// The user is selecting link text; default suppressed, no navigation
    Suppressed,
    Navigated(Route),
}

impl ClickOutcome {
    /// Whether the webview's own link following must be cancelled
    pub fn prevents_default(&self) -> bool {
        !matches!(self, ClickOutcome::Ignored)
    }
}

/// Receives in-app navigation requests
pub trait Navigator {
    fn navigate(&mut self, route: Route);
}

impl Navigator for Vec<Route> {
    fn navigate(&mut self, route: Route) {
        self.push(route);
    }
}

/// Turns clicks on internal links into in-app navigation
#[derive(Debug, Clone, Default)]
pub struct LinkClickHandler {
    pub disabled: bool,
}

impl LinkClickHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(
        &self,
        document: &Document,
        click: &ClickEvent,
        navigator: &mut dyn Navigator,
    ) -> ClickOutcome {
        if self.disabled || click.button == MouseButton::Secondary {
            return ClickOutcome::Ignored;
        }

        let Some((_, link)) = document.nearest_internal_link(click.target) else {
            return ClickOutcome::Ignored;
        };

        // Let the user select link text without following it
        if let Some(selection) = document.selection() {
            if !selection.is_collapsed() {
                debug!("click on link to {} ignored: selection active", link.uuid);
                return ClickOutcome::Suppressed;
            }
        }

        let route = link.route();
        debug!("navigating to {}", route);
        navigator.navigate(route.clone());
        ClickOutcome::Navigated(route)
    }
}
