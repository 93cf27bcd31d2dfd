use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{NoteId, SchemaId};

/// In-app navigation targets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Note(NoteId),
    Objects,
    Schemas,
    Schema(SchemaId),
    Settings,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => f.write_str("/"),
            Route::Note(uuid) => write!(f, "/notes/{}", uuid),
            Route::Objects => f.write_str("/objects"),
            Route::Schemas => f.write_str("/schemas"),
            Route::Schema(uuid) => write!(f, "/schemas/{}", uuid),
            Route::Settings => f.write_str("/settings"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no route matches {0:?}")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s
            .trim_start_matches('/')
            .trim_end_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let route = match segments.as_slice() {
            [] if s.starts_with('/') => Route::Home,
            ["notes", uuid] => Route::Note(NoteId::from(*uuid)),
            ["objects"] => Route::Objects,
            ["schemas"] => Route::Schemas,
            ["schemas", uuid] => Route::Schema(SchemaId::from(*uuid)),
            ["settings"] => Route::Settings,
            _ => return Err(UnknownRoute(s.to_string())),
        };
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_display_and_parse_agree() {
        let routes = [
            Route::Home,
            Route::Note(NoteId::from("abc-123")),
            Route::Objects,
            Route::Schemas,
            Route::Schema(SchemaId::from("s-1")),
            Route::Settings,
        ];
        for route in routes {
            assert_eq!(route.to_string().parse::<Route>().unwrap(), route);
        }
    }

    #[test]
    fn test_route_parse_edge_cases() {
        assert_eq!(
            "/notes/abc/".parse::<Route>().unwrap(),
            Route::Note(NoteId::from("abc"))
        );
        assert!("/notes".parse::<Route>().is_err());
        assert!("/notes/a/b".parse::<Route>().is_err());
        assert!("".parse::<Route>().is_err());
        assert!("/unknown".parse::<Route>().is_err());
    }
}
