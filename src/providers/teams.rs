//! League team directory: ids, abbreviations, and the names feeds use for them.

pub struct TeamInfo {
    pub id: i64,
    pub abbreviation: &'static str,
    pub full_name: &'static str,
    /// Lowercase names and nicknames seen in odds and injury feeds.
    pub aliases: &'static [&'static str],
}

pub static TEAMS: &[TeamInfo] = &[
    TeamInfo { id: 1610612737, abbreviation: "ATL", full_name: "Atlanta Hawks", aliases: &["atlanta hawks", "hawks", "atlanta"] },
    TeamInfo { id: 1610612738, abbreviation: "BOS", full_name: "Boston Celtics", aliases: &["boston celtics", "celtics", "boston"] },
    TeamInfo { id: 1610612751, abbreviation: "BKN", full_name: "Brooklyn Nets", aliases: &["brooklyn nets", "nets", "brooklyn"] },
    TeamInfo { id: 1610612766, abbreviation: "CHA", full_name: "Charlotte Hornets", aliases: &["charlotte hornets", "hornets", "charlotte"] },
    TeamInfo { id: 1610612741, abbreviation: "CHI", full_name: "Chicago Bulls", aliases: &["chicago bulls", "bulls", "chicago"] },
    TeamInfo { id: 1610612739, abbreviation: "CLE", full_name: "Cleveland Cavaliers", aliases: &["cleveland cavaliers", "cavaliers", "cavs", "cleveland"] },
    TeamInfo { id: 1610612742, abbreviation: "DAL", full_name: "Dallas Mavericks", aliases: &["dallas mavericks", "mavericks", "mavs", "dallas"] },
    TeamInfo { id: 1610612743, abbreviation: "DEN", full_name: "Denver Nuggets", aliases: &["denver nuggets", "nuggets", "denver"] },
    TeamInfo { id: 1610612765, abbreviation: "DET", full_name: "Detroit Pistons", aliases: &["detroit pistons", "pistons", "detroit"] },
    TeamInfo { id: 1610612744, abbreviation: "GSW", full_name: "Golden State Warriors", aliases: &["golden state warriors", "warriors", "golden state"] },
    TeamInfo { id: 1610612745, abbreviation: "HOU", full_name: "Houston Rockets", aliases: &["houston rockets", "rockets", "houston"] },
    TeamInfo { id: 1610612754, abbreviation: "IND", full_name: "Indiana Pacers", aliases: &["indiana pacers", "pacers", "indiana"] },
    TeamInfo { id: 1610612746, abbreviation: "LAC", full_name: "Los Angeles Clippers", aliases: &["la clippers", "los angeles clippers", "clippers"] },
    TeamInfo { id: 1610612747, abbreviation: "LAL", full_name: "Los Angeles Lakers", aliases: &["los angeles lakers", "la lakers", "lakers"] },
    TeamInfo { id: 1610612763, abbreviation: "MEM", full_name: "Memphis Grizzlies", aliases: &["memphis grizzlies", "grizzlies", "memphis"] },
    TeamInfo { id: 1610612748, abbreviation: "MIA", full_name: "Miami Heat", aliases: &["miami heat", "heat", "miami"] },
    TeamInfo { id: 1610612749, abbreviation: "MIL", full_name: "Milwaukee Bucks", aliases: &["milwaukee bucks", "bucks", "milwaukee"] },
    TeamInfo { id: 1610612750, abbreviation: "MIN", full_name: "Minnesota Timberwolves", aliases: &["minnesota timberwolves", "timberwolves", "wolves", "minnesota"] },
    TeamInfo { id: 1610612740, abbreviation: "NOP", full_name: "New Orleans Pelicans", aliases: &["new orleans pelicans", "pelicans", "new orleans"] },
    TeamInfo { id: 1610612752, abbreviation: "NYK", full_name: "New York Knicks", aliases: &["new york knicks", "knicks", "new york"] },
    TeamInfo { id: 1610612760, abbreviation: "OKC", full_name: "Oklahoma City Thunder", aliases: &["oklahoma city thunder", "thunder", "oklahoma city"] },
    TeamInfo { id: 1610612753, abbreviation: "ORL", full_name: "Orlando Magic", aliases: &["orlando magic", "magic", "orlando"] },
    TeamInfo { id: 1610612755, abbreviation: "PHI", full_name: "Philadelphia 76ers", aliases: &["philadelphia 76ers", "76ers", "sixers", "philadelphia"] },
    TeamInfo { id: 1610612756, abbreviation: "PHX", full_name: "Phoenix Suns", aliases: &["phoenix suns", "suns", "phoenix"] },
    TeamInfo { id: 1610612757, abbreviation: "POR", full_name: "Portland Trail Blazers", aliases: &["portland trail blazers", "trail blazers", "blazers", "portland"] },
    TeamInfo { id: 1610612758, abbreviation: "SAC", full_name: "Sacramento Kings", aliases: &["sacramento kings", "kings", "sacramento"] },
    TeamInfo { id: 1610612759, abbreviation: "SAS", full_name: "San Antonio Spurs", aliases: &["san antonio spurs", "spurs", "san antonio"] },
    TeamInfo { id: 1610612761, abbreviation: "TOR", full_name: "Toronto Raptors", aliases: &["toronto raptors", "raptors", "toronto"] },
    TeamInfo { id: 1610612762, abbreviation: "UTA", full_name: "Utah Jazz", aliases: &["utah jazz", "jazz", "utah"] },
    TeamInfo { id: 1610612764, abbreviation: "WAS", full_name: "Washington Wizards", aliases: &["washington wizards", "wizards", "washington"] },
];

/// Alternate codes some feeds use.
const ALT_CODES: &[(&str, &str)] = &[
    ("BRK", "BKN"),
    ("BK", "BKN"),
    ("CHO", "CHA"),
    ("GS", "GSW"),
    ("NO", "NOP"),
    ("NOR", "NOP"),
    ("NY", "NYK"),
    ("PHO", "PHX"),
    ("SA", "SAS"),
    ("UTAH", "UTA"),
    ("WSH", "WAS"),
];

const FUZZY_THRESHOLD: f64 = 0.92;

/// Codes that read as ordinary words in free text ("game was postponed", "48 min").
const WORD_CODES: &[&str] = &["DEN", "DET", "IND", "MEM", "MIL", "MIN", "POR", "SAC", "WAS"];

pub fn by_abbreviation(abbr: &str) -> Option<&'static TeamInfo> {
    TEAMS.iter().find(|t| t.abbreviation.eq_ignore_ascii_case(abbr))
}

pub fn by_id(id: i64) -> Option<&'static TeamInfo> {
    TEAMS.iter().find(|t| t.id == id)
}

/// Every abbreviation, sorted. This is the rank tie-break order.
pub fn league_abbreviations() -> Vec<String> {
    let mut all: Vec<String> = TEAMS.iter().map(|t| t.abbreviation.to_string()).collect();
    all.sort();
    all
}

/// Aliases for matching free text. The lowercase code is included unless it
/// doubles as a common word.
pub fn aliases_for(abbr: &str) -> Vec<String> {
    let mut aliases = Vec::new();
    if !WORD_CODES.iter().any(|code| code.eq_ignore_ascii_case(abbr)) {
        aliases.push(abbr.to_lowercase());
    }
    if let Some(team) = by_abbreviation(abbr) {
        aliases.extend(team.aliases.iter().map(|a| a.to_string()));
    }
    aliases.dedup();
    aliases
}

/// Resolves a code, city, nickname or full name to a league abbreviation.
pub fn normalize_team_token(raw: &str) -> Option<&'static str> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }
    if let Some(team) = by_abbreviation(token) {
        return Some(team.abbreviation);
    }
    let upper = token.to_uppercase();
    if let Some((_, abbr)) = ALT_CODES.iter().find(|(alt, _)| *alt == upper) {
        return Some(*abbr);
    }

    let lower = token.to_lowercase();
    if let Some(team) = TEAMS
        .iter()
        .find(|t| t.full_name.eq_ignore_ascii_case(&lower) || t.aliases.contains(&lower.as_str()))
    {
        return Some(team.abbreviation);
    }

    let needle = lower.as_str();
    TEAMS
        .iter()
        .flat_map(|t| {
            std::iter::once(t.full_name.to_lowercase())
                .chain(t.aliases.iter().map(|a| a.to_string()))
                .map(move |name| (t.abbreviation, strsim::jaro_winkler(needle, &name)))
        })
        .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(abbr, _)| abbr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_has_every_team_once() {
        let all = league_abbreviations();
        assert_eq!(all.len(), 30);
        assert_eq!(all.first().map(String::as_str), Some("ATL"));
        assert_eq!(by_id(1610612738).map(|t| t.abbreviation), Some("BOS"));
    }

    #[test]
    fn word_like_codes_are_not_aliases() {
        assert!(!aliases_for("WAS").contains(&"was".to_string()));
        assert!(aliases_for("WAS").contains(&"wizards".to_string()));
        assert!(!aliases_for("min").contains(&"min".to_string()));
        assert_eq!(aliases_for("BOS").first().map(String::as_str), Some("bos"));
    }

    #[test]
    fn normalizes_codes_and_names() {
        assert_eq!(normalize_team_token("bos"), Some("BOS"));
        assert_eq!(normalize_team_token("BRK"), Some("BKN"));
        assert_eq!(normalize_team_token("Los Angeles Lakers"), Some("LAL"));
        assert_eq!(normalize_team_token("sixers"), Some("PHI"));
        assert_eq!(normalize_team_token("Golden State Warrior"), Some("GSW"));
        assert_eq!(normalize_team_token("Springfield Isotopes"), None);
        assert_eq!(normalize_team_token(""), None);
    }
}
