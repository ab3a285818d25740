//! Slug tables for route sections.
//!
//! Every table is total in the `Section -> &str` direction. The reverse
//! direction distinguishes canonical slugs, deprecated aliases that must be
//! redirected, and unknown input that falls back to the default section.

use super::{ConfigSection, MemberSection, OrgSection, ViewMode};

/// A closed set of sections addressable by a URL slug.
pub trait Section: Copy + Eq + 'static {
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// Section used when the URL names none or an unknown one.
    const DEFAULT: Self;

    /// Deprecated slugs still accepted on input, with their replacement.
    const DEPRECATED: &'static [(&'static str, Self)];

    fn slug(self) -> &'static str;
}

/// Outcome of looking a raw slug up in a [`Section`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugMatch<S> {
    Canonical(S),
    Deprecated(S),
    Unknown,
}

impl<S: Section> SlugMatch<S> {
    /// Section to use, falling back to the default for unknown input.
    pub fn section(self) -> S {
        match self {
            Self::Canonical(section) | Self::Deprecated(section) => section,
            Self::Unknown => S::DEFAULT,
        }
    }
}

pub fn lookup<S: Section>(raw: &str) -> SlugMatch<S> {
    if let Some(section) = S::ALL.iter().copied().find(|s| s.slug() == raw) {
        return SlugMatch::Canonical(section);
    }
    S::DEPRECATED
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map_or(SlugMatch::Unknown, |(_, section)| {
            SlugMatch::Deprecated(*section)
        })
}

impl Section for ConfigSection {
    const ALL: &'static [Self] = &[
        Self::Members,
        Self::Capabilities,
        Self::TaskTypes,
        Self::Metrics,
    ];
    const DEFAULT: Self = Self::Members;
    const DEPRECATED: &'static [(&'static str, Self)] = &[
        ("team", Self::Members),
        ("skills", Self::Capabilities),
        ("types", Self::TaskTypes),
    ];

    fn slug(self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::Capabilities => "capabilities",
            Self::TaskTypes => "task-types",
            Self::Metrics => "metrics",
        }
    }
}

impl Section for OrgSection {
    const ALL: &'static [Self] = &[Self::Invites, Self::Projects, Self::Metrics];
    const DEFAULT: Self = Self::Invites;
    const DEPRECATED: &'static [(&'static str, Self)] = &[
        ("invite-links", Self::Invites),
        ("overview", Self::Metrics),
    ];

    fn slug(self) -> &'static str {
        match self {
            Self::Invites => "invites",
            Self::Projects => "projects",
            Self::Metrics => "metrics",
        }
    }
}

impl Section for MemberSection {
    const ALL: &'static [Self] = &[Self::Pool, Self::MyBar, Self::Skills, Self::Metrics];
    const DEFAULT: Self = Self::Pool;
    const DEPRECATED: &'static [(&'static str, Self)] =
        &[("bar", Self::MyBar), ("capabilities", Self::Skills)];

    fn slug(self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::MyBar => "my-bar",
            Self::Skills => "skills",
            Self::Metrics => "metrics",
        }
    }
}

impl ViewMode {
    pub const ALL: [Self; 3] = [Self::Pool, Self::List, Self::Cards];

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::List => "list",
            Self::Cards => "cards",
        }
    }

    #[must_use]
    pub fn from_slug(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.slug() == raw)
    }
}

/// Where a legacy `#/admin/<slug>` fragment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyTarget {
    Config(ConfigSection),
    Org(OrgSection),
}

const LEGACY_ADMIN: &[(&str, LegacyTarget)] = &[
    ("members", LegacyTarget::Config(ConfigSection::Members)),
    ("team", LegacyTarget::Config(ConfigSection::Members)),
    ("capabilities", LegacyTarget::Config(ConfigSection::Capabilities)),
    ("skills", LegacyTarget::Config(ConfigSection::Capabilities)),
    ("task-types", LegacyTarget::Config(ConfigSection::TaskTypes)),
    ("types", LegacyTarget::Config(ConfigSection::TaskTypes)),
    ("metrics", LegacyTarget::Config(ConfigSection::Metrics)),
    ("invites", LegacyTarget::Org(OrgSection::Invites)),
    ("invite-links", LegacyTarget::Org(OrgSection::Invites)),
    ("projects", LegacyTarget::Org(OrgSection::Projects)),
    ("org-metrics", LegacyTarget::Org(OrgSection::Metrics)),
];

/// Resolve a legacy admin slug; unknown slugs land on the config default.
#[must_use]
pub fn legacy_admin(raw: &str) -> LegacyTarget {
    LEGACY_ADMIN
        .iter()
        .find(|(slug, _)| *slug == raw)
        .map_or(LegacyTarget::Config(ConfigSection::DEFAULT), |(_, target)| {
            *target
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_table_is_consistent<S: Section + std::fmt::Debug>() {
        let mut seen = HashSet::new();
        for section in S::ALL {
            assert!(seen.insert(section.slug()), "duplicate slug {}", section.slug());
            assert_eq!(lookup::<S>(section.slug()), SlugMatch::Canonical(*section));
        }
        for (alias, _) in S::DEPRECATED {
            assert!(
                !seen.contains(alias),
                "deprecated alias {alias} shadows a canonical slug"
            );
        }
    }

    #[test]
    fn tables_are_bijective_on_canonical_slugs() {
        assert_table_is_consistent::<ConfigSection>();
        assert_table_is_consistent::<OrgSection>();
        assert_table_is_consistent::<MemberSection>();
    }

    #[test]
    fn deprecated_slugs_map_to_replacements() {
        assert_eq!(
            lookup::<ConfigSection>("team"),
            SlugMatch::Deprecated(ConfigSection::Members)
        );
        assert_eq!(
            lookup::<MemberSection>("bar"),
            SlugMatch::Deprecated(MemberSection::MyBar)
        );
    }

    #[test]
    fn unknown_slug_falls_back_to_default() {
        let found = lookup::<OrgSection>("nope");
        assert_eq!(found, SlugMatch::Unknown);
        assert_eq!(found.section(), OrgSection::Invites);
    }

    #[test]
    fn view_mode_slugs_round_trip() {
        for mode in ViewMode::ALL {
            assert_eq!(ViewMode::from_slug(mode.slug()), Some(mode));
        }
        assert_eq!(ViewMode::from_slug("grid"), None);
    }

    #[test]
    fn legacy_admin_slugs_split_between_config_and_org() {
        assert_eq!(
            legacy_admin("team"),
            LegacyTarget::Config(ConfigSection::Members)
        );
        assert_eq!(legacy_admin("org-metrics"), LegacyTarget::Org(OrgSection::Metrics));
        assert_eq!(
            legacy_admin("whatever"),
            LegacyTarget::Config(ConfigSection::Members)
        );
    }
}
