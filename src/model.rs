use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, Conflict};

macro_rules! labels {
    ($T:ty { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $T {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Organizer,
    Attendee,
    Exhibitor,
    Sponsor,
}

labels!(Role {
    Admin => "admin",
    Organizer => "organizer",
    Attendee => "attendee",
    Exhibitor => "exhibitor",
    Sponsor => "sponsor",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EventType {
    Conference,
    Wedding,
    Concert,
    Corporate,
    Other,
}

labels!(EventType {
    Conference => "conference",
    Wedding => "wedding",
    Concert => "concert",
    Corporate => "corporate",
    Other => "other",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Draft,
    Published,
    Cancelled,
}

labels!(EventStatus {
    Draft => "draft",
    Published => "published",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum TicketType {
    #[default]
    General,
    Vip,
    EarlyBird,
}

labels!(TicketType {
    General => "general",
    Vip => "vip",
    EarlyBird => "early-bird",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Active,
    Cancelled,
}

labels!(RegistrationStatus {
    Active => "active",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SponsorStatus {
    Pending,
    Active,
    Cancelled,
}

labels!(SponsorStatus {
    Pending => "pending",
    Active => "active",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExhibitorStatus {
    Registered,
    Confirmed,
    Cancelled,
}

labels!(ExhibitorStatus {
    Registered => "registered",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

/// Status machines shared by events, sponsorships and exhibitor applications.
pub trait Lifecycle: Copy + PartialEq + fmt::Display {
    fn allows(self, next: Self) -> bool;

    /// Staying in the same status is always allowed.
    fn transition(self, next: Self) -> AppResult<Self> {
        if self == next || self.allows(next) {
            Ok(next)
        } else {
            Err(Conflict::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            }
            .into())
        }
    }
}

impl Lifecycle for EventStatus {
    fn allows(self, next: Self) -> bool {
        use EventStatus::*;
        matches!(
            (self, next),
            (Draft, Published) | (Draft, Cancelled) | (Published, Draft) | (Published, Cancelled)
        )
    }
}

impl Lifecycle for SponsorStatus {
    fn allows(self, next: Self) -> bool {
        use SponsorStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Pending)
                | (Active, Cancelled)
                | (Cancelled, Pending)
        )
    }
}

impl Lifecycle for ExhibitorStatus {
    fn allows(self, next: Self) -> bool {
        use ExhibitorStatus::*;
        matches!(
            (self, next),
            (Registered, Confirmed)
                | (Registered, Cancelled)
                | (Confirmed, Registered)
                | (Confirmed, Cancelled)
                | (Cancelled, Registered)
        )
    }
}

/// A status write guarded by `AND status=?` matched no row. `current` is the
/// status read back afterwards; `None` means the row is gone.
pub(crate) fn stale_status<S: Lifecycle>(current: Option<S>, next: S, entity: &'static str) -> AppError {
    let Some(current) = current else {
        return AppError::NotFound(entity);
    };
    match current.transition(next) {
        Err(err) => err,
        Ok(_) => Conflict::StatusChanged(current.to_string()).into(),
    }
}

/// Trims and drops blank strings.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_events_stay_cancelled() {
        assert!(EventStatus::Cancelled.transition(EventStatus::Published).is_err());
        assert!(EventStatus::Cancelled.transition(EventStatus::Draft).is_err());
        assert_eq!(
            EventStatus::Draft.transition(EventStatus::Published).ok(),
            Some(EventStatus::Published)
        );
    }

    #[test]
    fn sponsors_cannot_jump_from_cancelled_to_active() {
        let err = SponsorStatus::Cancelled
            .transition(SponsorStatus::Active)
            .unwrap_err();
        match err {
            AppError::Conflict(Conflict::InvalidTransition { from, to }) => {
                assert_eq!(from, "cancelled");
                assert_eq!(to, "active");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(SponsorStatus::Cancelled.transition(SponsorStatus::Pending).is_ok());
    }

    #[test]
    fn exhibitors_reopen_through_registered() {
        assert!(ExhibitorStatus::Cancelled.transition(ExhibitorStatus::Confirmed).is_err());
        assert!(ExhibitorStatus::Cancelled.transition(ExhibitorStatus::Registered).is_ok());
        assert!(ExhibitorStatus::Confirmed.transition(ExhibitorStatus::Confirmed).is_ok());
    }

    #[test]
    fn stale_writes_explain_what_they_lost_to() {
        let err = stale_status(Some(SponsorStatus::Cancelled), SponsorStatus::Active, "sponsor");
        assert!(matches!(
            err,
            AppError::Conflict(Conflict::InvalidTransition { ref from, ref to }) if from == "cancelled" && to == "active"
        ));

        let err = stale_status(Some(EventStatus::Published), EventStatus::Cancelled, "event");
        assert!(matches!(err, AppError::Conflict(Conflict::StatusChanged(ref now)) if now == "published"));

        let err = stale_status(None, ExhibitorStatus::Confirmed, "exhibitor");
        assert!(matches!(err, AppError::NotFound("exhibitor")));
    }

    #[test]
    fn ticket_types_use_kebab_case_on_the_wire() {
        let parsed: TicketType = serde_json::from_str("\"early-bird\"").unwrap();
        assert_eq!(parsed, TicketType::EarlyBird);
        assert_eq!(serde_json::to_string(&TicketType::Vip).unwrap(), "\"vip\"");
    }

    #[test]
    fn blank_strings_are_dropped() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" Gold ".into())), Some("Gold".into()));
        assert_eq!(non_blank(None), None);
    }
}
