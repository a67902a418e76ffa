// Roster import: today's games and draftable player lists per team.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::game::room::{Player, Position, SidePair, TeamInfo};

/// Default ESPN site API base for NFL data.
pub const DEFAULT_BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/football/nfl";

/// Positions kept when importing a roster. Everything else (linemen,
/// kickers on most teams, long snappers) stays out of the pool; the team
/// defense is added as a synthesized DST entry.
const SKILL_POSITIONS: [&str; 4] = ["QB", "RB", "WR", "TE"];

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("roster provider returned no players for team {team}")]
    EmptyRoster { team: String },
    #[error("unexpected roster payload: {0}")]
    Malformed(String),
}

/// One scheduled or in-progress game offered for room creation.
#[derive(Debug, Clone, PartialEq)]
pub struct GameListing {
    pub id: String,
    /// Display label, e.g. "Packers @ Lions".
    pub label: String,
    pub status: String,
    pub home: TeamInfo,
    pub away: TeamInfo,
}

/// Supplies games and per-team player lists. Consumed once at room
/// creation; failures abort creation rather than producing an empty pool.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn list_games(&self) -> Result<Vec<GameListing>, RosterError>;
    async fn import_roster(&self, team: &TeamInfo) -> Result<Vec<Player>, RosterError>;
}

/// Import both sides of a game, failing if either side comes back empty.
pub async fn import_game_rosters(
    provider: &dyn RosterProvider,
    home: &TeamInfo,
    away: &TeamInfo,
) -> Result<SidePair<Vec<Player>>, RosterError> {
    let home_roster = provider.import_roster(home).await?;
    let away_roster = provider.import_roster(away).await?;
    Ok(SidePair::new(home_roster, away_roster))
}

/// Hex display color for a team abbreviation. ESPN's own colors are
/// unreliable, so a fixed table is used.
pub fn team_color(abbrev: &str) -> &'static str {
    match abbrev {
        "ARI" => "#97233F",
        "ATL" => "#A71930",
        "BAL" => "#241773",
        "BUF" => "#00338D",
        "CAR" => "#0085CA",
        "CHI" => "#0B162A",
        "CIN" => "#FB4F14",
        "CLE" => "#311D00",
        "DAL" => "#003594",
        "DEN" => "#FB4F14",
        "DET" => "#0076B6",
        "GB" => "#203731",
        "HOU" => "#03202F",
        "IND" => "#002C5F",
        "JAX" => "#006778",
        "KC" => "#E31837",
        "LAC" => "#0080C6",
        "LAR" => "#003594",
        "LV" => "#000000",
        "MIA" => "#008E97",
        "MIN" => "#4F2683",
        "NE" => "#002244",
        "NO" => "#D3BC8D",
        "NYG" => "#0B2265",
        "NYJ" => "#125740",
        "PHI" => "#004C54",
        "PIT" => "#FFB612",
        "SEA" => "#002244",
        "SF" => "#AA0000",
        "TB" => "#D50A0A",
        "TEN" => "#0C2340",
        "WAS" => "#5A1414",
        "AFC" => "#D50A0A",
        "NFC" => "#003594",
        _ => "#333333",
    }
}

/// Sort a pool for presentation: position priority, then jersey number.
fn sort_pool(players: &mut [Player]) {
    players.sort_by(|a, b| {
        a.position
            .sort_order()
            .cmp(&b.position.sort_order())
            .then(a.number.cmp(&b.number))
    });
}

// ---------------------------------------------------------------------------
// ESPN provider
// ---------------------------------------------------------------------------

/// Live provider backed by ESPN's public site API.
pub struct EspnProvider {
    client: reqwest::Client,
    base_url: String,
}

impl EspnProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        EspnProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn parse_team(competitor: &Value) -> Option<TeamInfo> {
        let team = competitor.get("team")?;
        let abbreviation = team.get("abbreviation")?.as_str()?.to_string();
        let name = team
            .get("shortDisplayName")
            .or_else(|| team.get("displayName"))?
            .as_str()?
            .to_string();
        Some(TeamInfo {
            id: team.get("id")?.as_str()?.to_string(),
            color: team_color(&abbreviation).to_string(),
            name,
            abbreviation,
        })
    }

    /// Parse one scoreboard event into a listing. Events missing a
    /// competition or either competitor are skipped (preseason oddities).
    fn parse_event(event: &Value) -> Option<GameListing> {
        let competition = event.get("competitions")?.get(0)?;
        let competitors = competition.get("competitors")?.as_array()?;
        let home = competitors
            .iter()
            .find(|c| c.get("homeAway").and_then(Value::as_str) == Some("home"))
            .and_then(Self::parse_team)?;
        let away = competitors
            .iter()
            .find(|c| c.get("homeAway").and_then(Value::as_str) == Some("away"))
            .and_then(Self::parse_team)?;
        let status = competition
            .pointer("/status/type/description")
            .and_then(Value::as_str)
            .unwrap_or("Scheduled")
            .to_string();
        Some(GameListing {
            id: event.get("id")?.as_str()?.to_string(),
            label: format!("{} @ {}", away.name, home.name),
            status,
            home,
            away,
        })
    }

    /// Parse a team roster payload into the draftable pool.
    fn parse_roster(team: &TeamInfo, body: &Value) -> Vec<Player> {
        let mut players = Vec::new();
        let groups = body
            .get("athletes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for group in &groups {
            let items = group.get("items").and_then(Value::as_array);
            for athlete in items.into_iter().flatten() {
                let Some(pos) = athlete
                    .pointer("/position/abbreviation")
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                if !SKILL_POSITIONS.contains(&pos) {
                    continue;
                }
                let Some(id) = athlete.get("id").and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }) else {
                    continue;
                };
                let Some(name) = athlete
                    .get("fullName")
                    .or_else(|| athlete.get("displayName"))
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                let number = athlete
                    .get("jersey")
                    .and_then(Value::as_str)
                    .and_then(|j| j.parse().ok())
                    .unwrap_or(0);
                players.push(Player {
                    id: format!("{}-{}", team.abbreviation.to_lowercase(), id),
                    name: name.to_string(),
                    position: Position::from_str_pos(pos),
                    number,
                });
            }
        }

        // The team defense scores too.
        players.push(Player {
            id: format!("{}-dst", team.abbreviation.to_lowercase()),
            name: format!("{} Defense", team.abbreviation),
            position: Position::Defense,
            number: 0,
        });

        sort_pool(&mut players);
        players
    }
}

#[async_trait]
impl RosterProvider for EspnProvider {
    async fn list_games(&self) -> Result<Vec<GameListing>, RosterError> {
        let url = format!("{}/scoreboard", self.base_url);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let events = body
            .get("events")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let listings: Vec<GameListing> = events.iter().filter_map(Self::parse_event).collect();
        if listings.len() < events.len() {
            warn!(
                skipped = events.len() - listings.len(),
                "scoreboard events missing competitor data"
            );
        }
        Ok(listings)
    }

    async fn import_roster(&self, team: &TeamInfo) -> Result<Vec<Player>, RosterError> {
        let url = format!("{}/teams/{}/roster", self.base_url, team.id);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let players = Self::parse_roster(team, &body);
        // A bare synthesized defense means the provider sent no athletes.
        if players.len() <= 1 {
            return Err(RosterError::EmptyRoster {
                team: team.name.clone(),
            });
        }
        Ok(players)
    }
}

// ---------------------------------------------------------------------------
// Static provider
// ---------------------------------------------------------------------------

/// Offline provider with a small built-in player set per team. Used for
/// custom/manual games and for tests; teams without a dedicated list get
/// a generic placeholder roster.
pub struct StaticProvider;

impl StaticProvider {
    fn known_team(abbrev: &str, name: &str) -> TeamInfo {
        TeamInfo {
            id: abbrev.to_lowercase(),
            name: name.to_string(),
            color: team_color(abbrev).to_string(),
            abbreviation: abbrev.to_string(),
        }
    }

    fn mock_players(abbrev: &str) -> Vec<(&'static str, &'static str, u32)> {
        match abbrev {
            "DET" => vec![
                ("Jared Goff", "QB", 16),
                ("Amon-Ra St. Brown", "WR", 14),
                ("Jahmyr Gibbs", "RB", 26),
                ("David Montgomery", "RB", 5),
                ("Sam LaPorta", "TE", 87),
                ("Jameson Williams", "WR", 9),
            ],
            "GB" => vec![
                ("Jordan Love", "QB", 10),
                ("Josh Jacobs", "RB", 8),
                ("Jayden Reed", "WR", 1),
                ("Christian Watson", "WR", 9),
                ("Romeo Doubs", "WR", 87),
                ("Luke Musgrave", "TE", 88),
            ],
            "KC" => vec![
                ("Patrick Mahomes", "QB", 15),
                ("Travis Kelce", "TE", 87),
                ("Isiah Pacheco", "RB", 10),
                ("Rashee Rice", "WR", 4),
                ("Xavier Worthy", "WR", 1),
            ],
            "SF" => vec![
                ("Brock Purdy", "QB", 13),
                ("Christian McCaffrey", "RB", 23),
                ("Deebo Samuel", "WR", 19),
                ("Brandon Aiyuk", "WR", 11),
                ("George Kittle", "TE", 85),
            ],
            _ => vec![
                ("Star Player 1", "QB", 1),
                ("Star Player 2", "WR", 88),
                ("Star Player 3", "RB", 20),
                ("Star Player 4", "TE", 40),
            ],
        }
    }
}

#[async_trait]
impl RosterProvider for StaticProvider {
    async fn list_games(&self) -> Result<Vec<GameListing>, RosterError> {
        let det = Self::known_team("DET", "Lions");
        let gb = Self::known_team("GB", "Packers");
        let kc = Self::known_team("KC", "Chiefs");
        let sf = Self::known_team("SF", "49ers");
        Ok(vec![
            GameListing {
                id: "static-1".into(),
                label: format!("{} @ {}", gb.name, det.name),
                status: "Scheduled".into(),
                home: det,
                away: gb,
            },
            GameListing {
                id: "static-2".into(),
                label: format!("{} @ {}", sf.name, kc.name),
                status: "Scheduled".into(),
                home: kc,
                away: sf,
            },
        ])
    }

    async fn import_roster(&self, team: &TeamInfo) -> Result<Vec<Player>, RosterError> {
        let abbrev = team.abbreviation.to_lowercase();
        let mut players: Vec<Player> = Self::mock_players(&team.abbreviation)
            .into_iter()
            .enumerate()
            .map(|(i, (name, pos, num))| Player {
                id: format!("{abbrev}-{i}"),
                name: name.to_string(),
                position: Position::from_str_pos(pos),
                number: num,
            })
            .collect();
        players.push(Player {
            id: format!("{abbrev}-dst"),
            name: format!("{} Defense", team.abbreviation),
            position: Position::Defense,
            number: 0,
        });
        sort_pool(&mut players);
        Ok(players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lions() -> TeamInfo {
        TeamInfo {
            id: "8".into(),
            name: "Lions".into(),
            color: team_color("DET").into(),
            abbreviation: "DET".into(),
        }
    }

    #[test]
    fn parse_roster_keeps_skill_positions_and_adds_dst() {
        let body = json!({
            "athletes": [
                {
                    "position": "offense",
                    "items": [
                        {"id": "101", "fullName": "Jared Goff",
                         "position": {"abbreviation": "QB"}, "jersey": "16"},
                        {"id": "102", "fullName": "Taylor Decker",
                         "position": {"abbreviation": "OT"}, "jersey": "68"},
                        {"id": "103", "fullName": "Jahmyr Gibbs",
                         "position": {"abbreviation": "RB"}, "jersey": "26"}
                    ]
                },
                {
                    "position": "specialTeam",
                    "items": [
                        {"id": "104", "fullName": "Jake Bates",
                         "position": {"abbreviation": "PK"}, "jersey": "39"}
                    ]
                }
            ]
        });
        let players = EspnProvider::parse_roster(&lions(), &body);
        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Jared Goff", "Jahmyr Gibbs", "DET Defense"]);
        assert_eq!(players[0].id, "det-101");
        assert_eq!(players[2].position, Position::Defense);
    }

    #[test]
    fn parse_roster_tolerates_missing_fields() {
        let body = json!({
            "athletes": [
                {"items": [
                    {"fullName": "No Id", "position": {"abbreviation": "QB"}},
                    {"id": "7", "position": {"abbreviation": "WR"}},
                    {"id": "8", "fullName": "No Jersey",
                     "position": {"abbreviation": "TE"}}
                ]}
            ]
        });
        let players = EspnProvider::parse_roster(&lions(), &body);
        // Only the entry with id + name survives; missing jersey is 0.
        assert_eq!(players.len(), 2); // TE + DST
        assert_eq!(players[0].name, "No Jersey");
        assert_eq!(players[0].number, 0);
    }

    #[test]
    fn parse_event_builds_listing() {
        let event = json!({
            "id": "401999",
            "competitions": [{
                "status": {"type": {"description": "In Progress"}},
                "competitors": [
                    {"homeAway": "home", "team": {
                        "id": "8", "abbreviation": "DET",
                        "shortDisplayName": "Lions"}},
                    {"homeAway": "away", "team": {
                        "id": "9", "abbreviation": "GB",
                        "shortDisplayName": "Packers"}}
                ]
            }]
        });
        let listing = EspnProvider::parse_event(&event).unwrap();
        assert_eq!(listing.label, "Packers @ Lions");
        assert_eq!(listing.status, "In Progress");
        assert_eq!(listing.home.color, "#0076B6");
    }

    #[test]
    fn parse_event_skips_incomplete_competitions() {
        assert!(EspnProvider::parse_event(&json!({"id": "1"})).is_none());
    }

    #[tokio::test]
    async fn static_provider_round_trip() {
        let provider = StaticProvider;
        let games = provider.list_games().await.unwrap();
        assert_eq!(games.len(), 2);

        let rosters =
            import_game_rosters(&provider, &games[0].home, &games[0].away)
                .await
                .unwrap();
        assert!(rosters.home.iter().any(|p| p.name == "Jared Goff"));
        assert!(rosters.away.iter().any(|p| p.id == "gb-dst"));
        // QB sorts first, defense last.
        assert_eq!(rosters.home[0].position, Position::Quarterback);
        assert_eq!(
            rosters.home.last().unwrap().position,
            Position::Defense
        );
    }
}
