//! DiscoverDaily GraphQL documents and request bodies

use serde_json::{json, Value};

use crate::config::UpstreamSettings;
use crate::model::ProgramType;

/// Role header the upstream expects from anonymous player traffic
pub const ROLE_HEADER: &str = "x-hasura-role";
pub const ROLE_PLAYER: &str = "PLAYER";

pub const DISCOVER_OPERATION: &str = "DiscoverDaily";

pub const DISCOVER_QUERY: &str = r#"query DiscoverDaily($where: discover_daily_bool_exp!, $limit: Int = 100) {
  discover_daily(where: $where, limit: $limit) {
    game_id
    game {
      _id
      start_time
      venueByVenue { _id shorthand_name }
      drop_in_capacity { total_available_spots }
      leagueByLeague { _id name display_name program_type sportBySport { name } }
    }
    league_id
    league {
      _id
      name
      display_name
      program_type
      start_date
      start_time_estimate
      sportBySport { name }
      venueByVenue { _id shorthand_name }
      registrants_aggregate { aggregate { count } }
      registrationByRegistration { max_registration_size }
    }
    event_start_date
  }
}"#;

/// Reduced DiscoverDaily used by the connectivity probe
pub const PROBE_DISCOVER_QUERY: &str = r#"query DiscoverDaily($where: discover_daily_bool_exp!, $limit: Int = 10) {
  discover_daily(where: $where, limit: $limit) {
    game_id
    league_id
    event_start_date
  }
}"#;

pub const MINIMAL_OPERATION: &str = "Probe";
pub const MINIMAL_QUERY: &str = "query Probe { __typename }";

/// Server-side filter mirroring the client-side one: game listings with
/// drop-in capacity, or open program registrations, at the watched venues
pub fn build_where(settings: &UpstreamSettings) -> Value {
    let venues: Vec<&str> = settings.venue_ids.iter().map(|v| v.as_str()).collect();
    let program_types: Vec<&str> = settings.program_types.iter().map(|p| p.code()).collect();

    // Game rows are drop-ins whatever their parent program type
    let mut game_program = json!({
        "organizationByOrganization": { "name": { "_eq": settings.organization } },
        "sportBySport": { "name": { "_in": [settings.sport] } },
    });
    if !settings.program_types.contains(&ProgramType::DropIn) {
        game_program["program_type"] = json!({ "_in": program_types });
    }

    json!({
        "_or": [
            {
                "league_id": { "_is_null": false },
                "league": {
                    "organizationByOrganization": { "name": { "_eq": settings.organization } },
                    "sportBySport": { "name": { "_in": [settings.sport] } },
                    "program_type": { "_in": program_types },
                    "status": { "_eq": "registration_open" },
                    "registrationByRegistration": { "available_spots": { "_gte": 1 } },
                    "venueByVenue": { "_id": { "_in": venues } },
                },
            },
            {
                "game_id": { "_is_null": false },
                "game": {
                    "leagueByLeague": game_program,
                    "venueByVenue": { "_id": { "_in": venues } },
                    "drop_in_capacity": { "total_available_spots": { "_gte": 1 } },
                },
            },
        ]
    })
}

pub fn discover_request(settings: &UpstreamSettings) -> Value {
    json!({
        "operationName": DISCOVER_OPERATION,
        "query": DISCOVER_QUERY,
        "variables": { "where": build_where(settings), "limit": settings.limit },
    })
}

pub fn probe_discover_request(settings: &UpstreamSettings) -> Value {
    json!({
        "operationName": DISCOVER_OPERATION,
        "query": PROBE_DISCOVER_QUERY,
        "variables": { "where": build_where(settings), "limit": 10 },
    })
}

pub fn minimal_request() -> Value {
    json!({
        "operationName": MINIMAL_OPERATION,
        "query": MINIMAL_QUERY,
        "variables": {},
    })
}
