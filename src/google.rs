//! Google Calendar adapter: OAuth flow, token refresh and event fetch.

use anyhow::{Context, Result};
use chrono::Local;
use google_calendar::types::{MinAccessRole, OrderBy};
use google_calendar::Client;
use huecal_core::{Attendee, CalendarEvent, EventTime, ResponseStatus};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use crate::config::{AccountTokens, CalendarConfig, GoogleConfig};

const REDIRECT_PORT: u16 = 8085;
const REDIRECT_URI: &str = "http://localhost:8085/callback";

const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar.readonly"];

/// Refresh this long before the access token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Hue schedule names are length-limited, so event ids are cut down before
/// they become part of a schedule name
const EVENT_ID_MAX_LEN: usize = 26;

/// Create a Google Calendar client from stored tokens
fn create_client(config: &GoogleConfig, tokens: &AccountTokens) -> Client {
    Client::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        REDIRECT_URI.to_string(),
        tokens.access_token.clone(),
        tokens.refresh_token.clone(),
    )
}

/// Create a new client for initial authentication (no tokens yet)
fn create_auth_client(config: &GoogleConfig) -> Client {
    Client::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        REDIRECT_URI.to_string(),
        String::new(),
        String::new(),
    )
}

/// Start a local HTTP server to receive the OAuth callback.
/// Returns (code, state).
fn wait_for_callback() -> Result<(String, String)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
        .with_context(|| format!("Failed to bind to port {}", REDIRECT_PORT))?;

    println!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Request line looks like: GET /callback?code=xxx&state=yyy HTTP/1.1
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .context("Invalid request")?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;

    let code = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .context("No code in callback")?;

    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .context("No state in callback")?;

    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok((code, state))
}

/// Run the full OAuth authentication flow
pub async fn authenticate(config: &GoogleConfig) -> Result<AccountTokens> {
    let mut client = create_auth_client(config);

    let scopes: Vec<String> = SCOPES.iter().map(|s| s.to_string()).collect();
    let auth_url = client.user_consent_url(&scopes);

    println!("\nOpen this URL in your browser to authenticate:\n");
    println!("{}\n", auth_url);

    if open::that(&auth_url).is_err() {
        println!("(Could not open browser automatically, please copy the URL above)");
    }

    let (code, state) = wait_for_callback()?;

    println!("\nReceived authorization code, exchanging for tokens...");

    let access_token = client
        .get_access_token(&code, &state)
        .await
        .context("Failed to exchange code for tokens")?;

    println!("Authentication successful!");

    let expires_at = if access_token.expires_in > 0 {
        Some(chrono::Utc::now() + chrono::Duration::seconds(access_token.expires_in))
    } else {
        None
    };

    Ok(AccountTokens {
        access_token: access_token.access_token,
        refresh_token: access_token.refresh_token,
        expires_at,
    })
}

/// Refresh an expired access token
pub async fn refresh_token(config: &GoogleConfig, tokens: &AccountTokens) -> Result<AccountTokens> {
    let client = create_client(config, tokens);

    let access_token = client
        .refresh_access_token()
        .await
        .context("Failed to refresh token")?;

    let expires_at = if access_token.expires_in > 0 {
        Some(chrono::Utc::now() + chrono::Duration::seconds(access_token.expires_in))
    } else {
        None
    };

    // Google typically doesn't return a new refresh_token on refresh
    let refresh_token = if access_token.refresh_token.is_empty() {
        tokens.refresh_token.clone()
    } else {
        access_token.refresh_token
    };

    Ok(AccountTokens {
        access_token: access_token.access_token,
        refresh_token,
        expires_at,
    })
}

/// Whether the stored access token is expired or about to expire
pub fn tokens_need_refresh(tokens: &AccountTokens) -> bool {
    match tokens.expires_at {
        Some(expires_at) => {
            chrono::Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) >= expires_at
        }
        None => false,
    }
}

/// Fetch the user's email to verify authentication
pub async fn fetch_user_email(config: &GoogleConfig, tokens: &AccountTokens) -> Result<String> {
    let client = create_client(config, tokens);

    // The primary calendar's ID is typically the user's email
    let response = client
        .calendar_list()
        .list_all(MinAccessRole::default(), false, false)
        .await?;

    for cal in response.body {
        if cal.primary && !cal.id.is_empty() {
            return Ok(cal.id);
        }
    }

    Ok("(unknown email)".to_string())
}

/// Fetch upcoming events and convert them for the timeline builder.
///
/// The range starts `lookback_minutes` in the past so a meeting that began
/// shortly before now is still picked up, and runs to the end of the
/// current local day (later events would be dropped by the day filter
/// anyway). Events come back sorted by start and capped at `max_results`.
pub async fn fetch_meetings(
    config: &GoogleConfig,
    calendar: &CalendarConfig,
    tokens: &AccountTokens,
) -> Result<Vec<CalendarEvent>> {
    let client = create_client(config, tokens);

    let now = chrono::Utc::now();
    let time_min = (now - chrono::Duration::minutes(calendar.lookback_minutes)).to_rfc3339();
    let time_max = (now + chrono::Duration::days(1)).to_rfc3339();

    let response = client
        .events()
        .list_all(
            &config.calendar_id,
            "",                 // i_cal_uid
            0,                  // max_attendees
            OrderBy::default(), // order_by (we sort locally)
            &[],                // private_extended_property
            "",                 // q (search query)
            &[],                // shared_extended_property
            false,              // show_deleted
            false,              // show_hidden_invitations
            true,               // single_events: expand recurring meetings
            &time_max,
            &time_min,
            "",                 // time_zone
            "",                 // updated_min
        )
        .await
        .context("Failed to fetch events")?;

    let mut result = Vec::new();

    for event in response.body {
        if event.status == "cancelled" || event.id.is_empty() {
            continue;
        }

        // Convert Google's UTC instants to naive local time: the bridge
        // schedules run on local wall-clock time
        let start = if let Some(ref start) = event.start {
            if let Some(dt) = start.date_time {
                EventTime::DateTime(dt.with_timezone(&Local).naive_local())
            } else if let Some(d) = start.date {
                EventTime::Date(d)
            } else {
                continue;
            }
        } else {
            continue;
        };

        let end = if let Some(ref end) = event.end {
            if let Some(dt) = end.date_time {
                EventTime::DateTime(dt.with_timezone(&Local).naive_local())
            } else if let Some(d) = end.date {
                EventTime::Date(d)
            } else {
                continue;
            }
        } else {
            continue;
        };

        let creator = event
            .creator
            .as_ref()
            .map(|c| c.email.clone())
            .unwrap_or_default();

        // Unknown response statuses map to NeedsAction: such attendees
        // still count toward the group size
        let attendees: Vec<Attendee> = event
            .attendees
            .iter()
            .map(|a| Attendee {
                email: a.email.clone(),
                response_status: ResponseStatus::from_google(&a.response_status)
                    .unwrap_or(ResponseStatus::NeedsAction),
            })
            .collect();

        // Prefer the legacy hangout link, fall back to conference data
        let video_link = if !event.hangout_link.is_empty() {
            Some(event.hangout_link.clone())
        } else {
            event.conference_data.as_ref().and_then(|cd| {
                cd.entry_points
                    .iter()
                    .find(|ep| ep.entry_point_type == "video")
                    .map(|ep| ep.uri.clone())
            })
        };

        let mut id = event.id;
        id.truncate(EVENT_ID_MAX_LEN);

        result.push(CalendarEvent {
            id,
            summary: if event.summary.is_empty() {
                "(No title)".to_string()
            } else {
                event.summary
            },
            creator,
            attendees,
            video_link,
            start,
            end,
        });
    }

    result.sort_by_key(|e| e.start.sort_key());
    result.truncate(calendar.max_results);

    Ok(result)
}
