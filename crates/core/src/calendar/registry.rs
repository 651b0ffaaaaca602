//! Enabled-source resolution
//!
//! An account contributes sources only when its master switch is explicitly
//! on. An account without a sub-calendar map is queried on its primary
//! calendar; otherwise exactly the sub-calendars switched on are queried.

use std::collections::HashSet;

use schej_domain::constants::PRIMARY_CALENDAR_ID;
use schej_domain::{ProviderKind, User};

use super::ports::CalendarSource;

/// Sources to query for `user`, in account-link order then sub-calendar order.
pub fn enabled_sources(user: &User) -> Vec<CalendarSource> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for account in user.calendar_accounts.iter().filter(|a| a.enabled.is_on()) {
        let calendars: Vec<&str> = match &account.sub_calendars {
            None => vec![PRIMARY_CALENDAR_ID],
            Some(subs) => subs.iter().filter(|s| s.enabled.is_on()).map(|s| s.id.as_str()).collect(),
        };

        for calendar in calendars {
            let source = CalendarSource::new(user, account, calendar);
            if seen.insert(source.id.clone()) {
                sources.push(source);
            }
        }
    }

    sources
}

/// Calendar that receives entries for finalized polls owned by `user`.
///
/// Google accounts use their primary calendar. CalDAV accounts use their
/// first listed sub-calendar, or let the provider discover one.
pub fn push_target(user: &User, account_email: &str) -> Option<CalendarSource> {
    let account = user.account(account_email)?;
    let calendar = match account.provider() {
        ProviderKind::Google => PRIMARY_CALENDAR_ID,
        ProviderKind::CalDav => account
            .sub_calendars
            .as_ref()
            .and_then(|subs| subs.first())
            .map_or(PRIMARY_CALENDAR_ID, |s| s.id.as_str()),
    };
    Some(CalendarSource::new(user, account, calendar))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use schej_domain::{
        AccountCredentials, BasicCredentials, CalendarAccount, OAuthTokens, SubCalendar, Toggle,
    };

    use super::*;

    fn google(email: &str) -> CalendarAccount {
        CalendarAccount::new(
            email,
            AccountCredentials::OAuth(OAuthTokens {
                access_token: "access".into(),
                access_token_expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                refresh_token: "refresh".into(),
            }),
        )
    }

    fn ids(sources: &[CalendarSource]) -> Vec<String> {
        sources.iter().map(|s| s.id.to_string()).collect()
    }

    #[test]
    fn unset_account_flag_excludes_account() {
        let mut user = User::new("u1", "a@example.com");
        let mut account = google("a@example.com");
        account.enabled = Toggle::Unset;
        user.upsert_account(account);

        assert!(enabled_sources(&user).is_empty());
    }

    #[test]
    fn missing_sub_calendar_map_means_primary() {
        let mut user = User::new("u1", "a@example.com");
        user.upsert_account(google("a@example.com"));

        assert_eq!(ids(&enabled_sources(&user)), vec!["a@example.com/primary"]);
    }

    #[test]
    fn only_switched_on_sub_calendars_are_queried() {
        let mut user = User::new("u1", "a@example.com");
        user.upsert_account(
            google("a@example.com")
                .with_sub_calendar(SubCalendar::new("work", "Work", Toggle::On))
                .with_sub_calendar(SubCalendar::new("holidays", "Holidays", Toggle::Off))
                .with_sub_calendar(SubCalendar::new("shared", "Shared", Toggle::Unset)),
        );
        user.upsert_account(google("b@example.com"));

        assert_eq!(ids(&enabled_sources(&user)), vec!["a@example.com/work", "b@example.com/primary"]);
    }

    #[test]
    fn empty_sub_calendar_map_yields_nothing() {
        let mut user = User::new("u1", "a@example.com");
        let mut account = google("a@example.com");
        account.sub_calendars = Some(Vec::new());
        user.upsert_account(account);

        assert!(enabled_sources(&user).is_empty());
    }

    #[test]
    fn push_target_picks_provider_specific_calendar() {
        let mut user = User::new("u1", "a@example.com");
        user.upsert_account(
            google("a@example.com").with_sub_calendar(SubCalendar::new("work", "Work", Toggle::On)),
        );
        user.upsert_account(
            CalendarAccount::new(
                "me@icloud.com",
                AccountCredentials::Basic(BasicCredentials {
                    server_url: "https://caldav.icloud.com".into(),
                    username: "me".into(),
                    password: "app-password".into(),
                    timed_only: false,
                }),
            )
            .with_sub_calendar(SubCalendar::new("/cal/home/", "Home", Toggle::Off)),
        );

        assert_eq!(push_target(&user, "a@example.com").unwrap().id.calendar, "primary");
        assert_eq!(push_target(&user, "me@icloud.com").unwrap().id.calendar, "/cal/home/");
        assert!(push_target(&user, "missing@example.com").is_none());
    }
}
