//! Lightweight language detection for sampled and extracted text.
//!
//! Keyword frequency scoring over the languages lending documentation
//! commonly arrives in. Returns ISO 639-3 codes.

/// Minimum trimmed length before a guess is attempted.
const MIN_DETECTABLE_CHARS: usize = 20;

/// Minimum indicator hits for the winning language.
const MIN_SCORE: u32 = 2;

const ENGLISH_INDICATORS: &[&str] = &[
    " the ", " and ", " was ", " for ", " are ", " our ", " with ", " this ",
    " that ", " from ", " have ", " has ", " were ", " which ", " by ",
    // Reporting English
    "emissions", "report", "compared", "reduction", "renewable", "year",
];

const FRENCH_INDICATORS: &[&str] = &[
    " le ", " la ", " les ", " des ", " du ", " et ", " est ", " une ", " pour ",
    " par ", " dans ", " avec ", " sur ", " nos ", " aux ",
    // Reporting French
    "émissions", "rapport", "réduction", "énergie", "exercice", "d'", "l'",
];

const GERMAN_INDICATORS: &[&str] = &[
    " der ", " die ", " das ", " und ", " ist ", " von ", " mit ", " für ",
    " wir ", " auf ", " den ", " im ",
    "emissionen", "bericht", "anteil", "erneuerbare", "geschäftsjahr",
];

const SPANISH_INDICATORS: &[&str] = &[
    " el ", " los ", " las ", " del ", " y ", " es ", " una ", " para ",
    " con ", " por ", " nuestra ", " nuestro ",
    "emisiones", "informe", "reducción", "energía", "ejercicio",
];

const LANGUAGES: &[(&str, &[&str])] = &[
    ("eng", ENGLISH_INDICATORS),
    ("fra", FRENCH_INDICATORS),
    ("deu", GERMAN_INDICATORS),
    ("spa", SPANISH_INDICATORS),
];

/// Detect the dominant language of `text`.
///
/// Returns `None` for samples too short or too ambiguous to call. Ties go
/// to the language listed first.
pub fn detect_language(text: &str) -> Option<&'static str> {
    if text.trim().chars().count() < MIN_DETECTABLE_CHARS {
        return None;
    }

    let lower = format!(" {} ", text.to_lowercase().replace(['\n', '\t'], " "));

    let mut best: Option<(&'static str, u32)> = None;
    for &(code, indicators) in LANGUAGES {
        let mut score = count_indicators(&lower, indicators);
        if code == "fra" {
            score += count_french_diacritics(&lower);
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((code, score));
        }
    }

    best.filter(|(_, score)| *score >= MIN_SCORE).map(|(code, _)| code)
}

fn count_indicators(lower_text: &str, indicators: &[&str]) -> u32 {
    indicators
        .iter()
        .map(|indicator| lower_text.matches(indicator).count() as u32)
        .sum()
}

/// Each 2 diacritics = 1 point.
fn count_french_diacritics(lower_text: &str) -> u32 {
    let count = lower_text
        .chars()
        .filter(|ch| {
            matches!(
                ch,
                'é' | 'è' | 'ê' | 'ë' | 'ç' | 'ù' | 'û' | 'î' | 'ï' | 'ô' | 'à' | 'â' | 'œ'
            )
        })
        .count() as u32;
    count / 2
}
