//! Location <-> [`Route`] conversion.
//!
//! `parse` never fails: unknown paths fall back to [`Route::Login`], unknown
//! slugs to the default section. Inputs that are understood but not
//! canonical (legacy hash URLs, deprecated slugs, bad `project`/`view`
//! values) come back as [`ParseResult::Redirect`] so the caller can replace
//! the history entry with the canonical URL.
//!
//! For every route `r`, `parse(&Location::parse_url(&format(&r)))` is
//! `Parsed(r)`.

use super::slug::{self, LegacyTarget, SlugMatch};
use super::{ConfigSection, MemberSection, OrgSection, Route, ViewMode};
use crate::model::ProjectId;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A browser location split into its three parts, without the leading
/// `?` and `#`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub fragment: String,
}

impl Location {
    pub fn new(
        path: impl Into<String>,
        query: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            fragment: fragment.into(),
        }
    }

    /// Split a raw URL. A leading `scheme://host` is dropped.
    #[must_use]
    pub fn parse_url(raw: &str) -> Self {
        let rest = strip_origin(raw.trim());
        let (before_fragment, fragment) = rest.split_once('#').unwrap_or((rest, ""));
        let (path, query) = before_fragment
            .split_once('?')
            .unwrap_or((before_fragment, ""));
        let path = if path.is_empty() { "/" } else { path };
        Self::new(path, query, fragment)
    }
}

fn strip_origin(raw: &str) -> &str {
    let Some(idx) = raw.find("://") else {
        return raw;
    };
    let scheme = &raw[..idx];
    let is_scheme = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !is_scheme {
        return raw;
    }
    let after = &raw[idx + 3..];
    after
        .find(['/', '?', '#'])
        .map_or("", |start| &after[start..])
}

/// Result of [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "route", rename_all = "lowercase")]
pub enum ParseResult {
    /// The location is canonical for this route.
    Parsed(Route),
    /// The location maps to this route but should be rewritten (replace,
    /// not push) to the route's canonical URL.
    Redirect(Route),
}

impl ParseResult {
    #[must_use]
    pub const fn route(&self) -> &Route {
        match self {
            Self::Parsed(route) | Self::Redirect(route) => route,
        }
    }

    #[must_use]
    pub fn into_route(self) -> Route {
        match self {
            Self::Parsed(route) | Self::Redirect(route) => route,
        }
    }

    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }
}

/// Parse a location into a route.
#[must_use]
pub fn parse(location: &Location) -> ParseResult {
    let params = QueryParams::parse(&location.query);
    let segments: Vec<&str> = location
        .path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [] => parse_legacy(&location.fragment, &params)
            .map_or(ParseResult::Parsed(Route::Login), ParseResult::Redirect),
        ["accept-invite"] => ParseResult::Parsed(Route::AcceptInvite {
            token: params.get("token").unwrap_or_default(),
        }),
        ["reset-password"] => ParseResult::Parsed(Route::ResetPassword {
            token: params.get("token").unwrap_or_default(),
        }),
        ["config", rest @ ..] if rest.len() <= 1 => {
            parse_config(rest.first().copied().unwrap_or(""), &params)
        }
        ["org", rest @ ..] if rest.len() <= 1 => {
            parse_org(rest.first().copied().unwrap_or(""))
        }
        ["app", rest @ ..] if rest.len() <= 1 => {
            parse_member(rest.first().copied().unwrap_or(""), &params)
        }
        _ => ParseResult::Parsed(Route::Login),
    }
}

fn parse_config(raw_slug: &str, params: &QueryParams) -> ParseResult {
    let found = slug::lookup::<ConfigSection>(raw_slug);
    let (project, bad_project) = parse_project(params);
    let route = Route::Config {
        section: found.section(),
        project,
    };
    finish(route, matches!(found, SlugMatch::Deprecated(_)) || bad_project)
}

fn parse_org(raw_slug: &str) -> ParseResult {
    let found = slug::lookup::<OrgSection>(raw_slug);
    let route = Route::Org {
        section: found.section(),
    };
    finish(route, matches!(found, SlugMatch::Deprecated(_)))
}

fn parse_member(raw_slug: &str, params: &QueryParams) -> ParseResult {
    let found = slug::lookup::<MemberSection>(raw_slug);
    let (project, bad_project) = parse_project(params);
    let (view, bad_view) = match params.get("view") {
        None => (None, false),
        Some(raw) => ViewMode::from_slug(&raw).map_or((None, true), |mode| (Some(mode), false)),
    };
    let route = Route::Member {
        section: found.section(),
        project,
        view,
    };
    finish(
        route,
        matches!(found, SlugMatch::Deprecated(_)) || bad_project || bad_view,
    )
}

/// `/?project=N#/admin/<slug>` from before path-based routing.
fn parse_legacy(fragment: &str, params: &QueryParams) -> Option<Route> {
    let fragment = fragment.trim_start_matches('#');
    let rest = fragment.strip_prefix("/admin")?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    let raw_slug = rest
        .trim_start_matches('/')
        .split(['/', '?'])
        .next()
        .unwrap_or("");

    let route = match slug::legacy_admin(raw_slug) {
        LegacyTarget::Config(section) => Route::Config {
            section,
            project: parse_project(params).0,
        },
        LegacyTarget::Org(section) => Route::Org { section },
    };
    tracing::debug!(slug = raw_slug, "legacy admin fragment redirected");
    Some(route)
}

/// `(project, was_invalid)`; an invalid value is dropped.
fn parse_project(params: &QueryParams) -> (Option<ProjectId>, bool) {
    match params.get("project") {
        None => (None, false),
        Some(raw) => raw
            .parse::<ProjectId>()
            .map_or((None, true), |project| (Some(project), false)),
    }
}

fn finish(route: Route, needs_redirect: bool) -> ParseResult {
    if needs_redirect {
        ParseResult::Redirect(route)
    } else {
        ParseResult::Parsed(route)
    }
}

/// Format a route as `path[?query]`.
#[must_use]
pub fn format(route: &Route) -> String {
    use slug::Section as _;

    match route {
        Route::Login => "/".to_string(),
        Route::AcceptInvite { token } => format!("/accept-invite?token={}", encode(token)),
        Route::ResetPassword { token } => format!("/reset-password?token={}", encode(token)),
        Route::Config { section, project } => {
            let mut query = QueryBuilder::default();
            if let Some(project) = project {
                query.push("project", &project.to_string());
            }
            query.finish(format!("/config/{}", section.slug()))
        }
        Route::Org { section } => format!("/org/{}", section.slug()),
        Route::Member {
            section,
            project,
            view,
        } => {
            let mut query = QueryBuilder::default();
            if let Some(project) = project {
                query.push("project", &project.to_string());
            }
            if let Some(view) = view {
                query.push("view", view.slug());
            }
            query.finish(format!("/app/{}", section.slug()))
        }
    }
}

#[derive(Default)]
struct QueryBuilder {
    pairs: Vec<String>,
}

impl QueryBuilder {
    fn push(&mut self, key: &str, value: &str) {
        self.pairs.push(format!("{}={}", encode(key), encode(value)));
    }

    fn finish(self, path: String) -> String {
        if self.pairs.is_empty() {
            path
        } else {
            format!("{path}?{}", self.pairs.join("&"))
        }
    }
}

/// Decoded `key=value` pairs in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
#[must_use]
pub fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Percent-decode; `+` is a space and malformed escapes are kept literally.
#[must_use]
pub fn decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escaped = bytes
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = escaped {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pid;

    fn parse_url(raw: &str) -> ParseResult {
        parse(&Location::parse_url(raw))
    }

    #[test]
    fn root_is_login() {
        assert_eq!(parse_url("/"), ParseResult::Parsed(Route::Login));
        assert_eq!(parse_url(""), ParseResult::Parsed(Route::Login));
    }

    #[test]
    fn unknown_paths_fall_back_to_login() {
        assert_eq!(parse_url("/nope"), ParseResult::Parsed(Route::Login));
        assert_eq!(
            parse_url("/config/members/extra"),
            ParseResult::Parsed(Route::Login)
        );
    }

    #[test]
    fn config_route_with_project() {
        assert_eq!(
            parse_url("/config/members?project=3"),
            ParseResult::Parsed(Route::Config {
                section: ConfigSection::Members,
                project: Some(pid(3)),
            })
        );
    }

    #[test]
    fn invalid_project_is_stripped_by_redirect() {
        for raw in ["abc", "0", "-4", "1.5", ""] {
            let url = format!("/config/task-types?project={raw}");
            assert_eq!(
                parse_url(&url),
                ParseResult::Redirect(Route::Config {
                    section: ConfigSection::TaskTypes,
                    project: None,
                }),
                "{url}"
            );
        }
    }

    #[test]
    fn member_route_with_view() {
        assert_eq!(
            parse_url("/app/pool?view=cards&project=2"),
            ParseResult::Parsed(Route::Member {
                section: MemberSection::Pool,
                project: Some(pid(2)),
                view: Some(ViewMode::Cards),
            })
        );
    }

    #[test]
    fn invalid_view_is_stripped_by_redirect() {
        assert_eq!(
            parse_url("/app/pool?view=grid&project=2"),
            ParseResult::Redirect(Route::Member {
                section: MemberSection::Pool,
                project: Some(pid(2)),
                view: None,
            })
        );
    }

    #[test]
    fn deprecated_slug_redirects_to_canonical() {
        assert_eq!(
            parse_url("/config/team?project=5"),
            ParseResult::Redirect(Route::Config {
                section: ConfigSection::Members,
                project: Some(pid(5)),
            })
        );
        assert_eq!(
            parse_url("/app/bar"),
            ParseResult::Redirect(Route::Member {
                section: MemberSection::MyBar,
                project: None,
                view: None,
            })
        );
    }

    #[test]
    fn unknown_slug_parses_to_default_section() {
        assert_eq!(
            parse_url("/org/wat"),
            ParseResult::Parsed(Route::Org {
                section: OrgSection::Invites,
            })
        );
        assert_eq!(
            parse_url("/app"),
            ParseResult::Parsed(Route::Member {
                section: MemberSection::Pool,
                project: None,
                view: None,
            })
        );
    }

    #[test]
    fn legacy_hash_urls_redirect() {
        assert_eq!(
            parse_url("/?project=4#/admin/members"),
            ParseResult::Redirect(Route::Config {
                section: ConfigSection::Members,
                project: Some(pid(4)),
            })
        );
        assert_eq!(
            parse_url("https://tasks.example.com/?project=4#/admin/org-metrics"),
            ParseResult::Redirect(Route::Org {
                section: OrgSection::Metrics,
            })
        );
        assert_eq!(
            parse_url("/?project=zz#/admin/capabilities"),
            ParseResult::Redirect(Route::Config {
                section: ConfigSection::Capabilities,
                project: None,
            })
        );
    }

    #[test]
    fn non_admin_fragment_is_ignored() {
        assert_eq!(parse_url("/#/administer"), ParseResult::Parsed(Route::Login));
        assert_eq!(parse_url("/#top"), ParseResult::Parsed(Route::Login));
    }

    #[test]
    fn tokens_are_percent_decoded() {
        assert_eq!(
            parse_url("/accept-invite?token=a%2Fb+c"),
            ParseResult::Parsed(Route::AcceptInvite {
                token: "a/b c".to_string(),
            })
        );
        assert_eq!(
            parse_url("/reset-password"),
            ParseResult::Parsed(Route::ResetPassword {
                token: String::new(),
            })
        );
    }

    #[test]
    fn format_produces_canonical_urls() {
        assert_eq!(format(&Route::Login), "/");
        assert_eq!(
            format(&Route::Member {
                section: MemberSection::MyBar,
                project: Some(pid(9)),
                view: Some(ViewMode::List),
            }),
            "/app/my-bar?project=9&view=list"
        );
        assert_eq!(
            format(&Route::AcceptInvite {
                token: "x y/z".to_string(),
            }),
            "/accept-invite?token=x%20y%2Fz"
        );
    }

    #[test]
    fn malformed_escapes_survive_decoding() {
        assert_eq!(decode("100%"), "100%");
        assert_eq!(decode("%zz"), "%zz");
        assert_eq!(decode("%41"), "A");
    }

    #[test]
    fn first_repeated_key_wins() {
        let params = QueryParams::parse("project=1&project=2");
        assert_eq!(params.get("project").as_deref(), Some("1"));
    }

    #[test]
    fn parse_url_strips_origin_only_when_scheme_like() {
        let loc = Location::parse_url("http://host:8080/app/pool?view=list#x");
        assert_eq!(loc.path, "/app/pool");
        assert_eq!(loc.query, "view=list");
        assert_eq!(loc.fragment, "x");

        let loc = Location::parse_url("/accept-invite?token=http://a");
        assert_eq!(loc.path, "/accept-invite");
        assert_eq!(loc.query, "token=http://a");
    }
}
