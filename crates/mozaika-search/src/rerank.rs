//! Profile-based re-ranking of semantic search results.
//!
//! Pure functions: the profile score is a weighted fraction of the
//! preference factors that apply to both the profile and the event, then
//! blended with the semantic similarity score.

use mozaika_core::{EventSearchResult, MatchTier, Profile, RemotePreference};

const CITY_WEIGHT: f32 = 0.3;
const LANGUAGE_WEIGHT: f32 = 0.2;
const CATEGORY_WEIGHT: f32 = 0.3;
const REMOTE_WEIGHT: f32 = 0.2;

/// Score applied when no preference factor is comparable.
const NEUTRAL_SCORE: f32 = 0.5;

/// Weight of the semantic score in the final blend.
const SEMANTIC_BLEND: f32 = 0.7;

/// Tier thresholds on the blended score.
const HIGH_THRESHOLD: f32 = 0.7;
const MEDIUM_THRESHOLD: f32 = 0.4;

/// Compute the profile-preference score for one event.
///
/// Each factor only counts when both sides state it: a profile without a
/// city never penalizes events, and an event without a city is neutral
/// for a profile that has one. An "any" remote preference awards half the
/// remote weight to every event that states remoteness.
pub fn profile_score(event: &EventSearchResult, profile: &Profile) -> f32 {
    let mut score = 0.0f32;
    let mut factors = 0.0f32;

    if let (Some(profile_city), Some(event_city)) = (&profile.city, &event.city) {
        if event_city.to_lowercase() == profile_city.to_lowercase() {
            score += CITY_WEIGHT;
        }
        factors += CITY_WEIGHT;
    }

    if !profile.languages.is_empty() {
        if profile.languages.iter().any(|l| l == &event.language) {
            score += LANGUAGE_WEIGHT;
        }
        factors += LANGUAGE_WEIGHT;
    }

    if !profile.preferred_categories.is_empty() && !event.categories_slugs.is_empty() {
        let overlap = event
            .categories_slugs
            .iter()
            .any(|slug| profile.preferred_categories.iter().any(|p| p == slug));
        if overlap {
            score += CATEGORY_WEIGHT;
        }
        factors += CATEGORY_WEIGHT;
    }

    if let (Some(pref), Some(is_remote)) = (profile.remote_preference, event.is_remote) {
        match pref {
            RemotePreference::Remote if is_remote => score += REMOTE_WEIGHT,
            RemotePreference::Onsite if !is_remote => score += REMOTE_WEIGHT,
            RemotePreference::Any => score += REMOTE_WEIGHT / 2.0,
            _ => {}
        }
        factors += REMOTE_WEIGHT;
    }

    if factors > 0.0 {
        score / factors
    } else {
        NEUTRAL_SCORE
    }
}

/// Tier for a blended match score.
pub fn match_tier(score: f32) -> MatchTier {
    if score >= HIGH_THRESHOLD {
        MatchTier::High
    } else if score >= MEDIUM_THRESHOLD {
        MatchTier::Medium
    } else {
        MatchTier::Low
    }
}

/// Apply profile scores to a result set and sort it by blended score.
///
/// Every result gets `match_score` and `match_tier` filled in. When a
/// semantic score is present the final score is
/// `0.7 * semantic + 0.3 * profile`; otherwise the profile score stands
/// alone.
pub fn apply_profile(results: &mut [EventSearchResult], profile: &Profile) {
    for event in results.iter_mut() {
        let preference = profile_score(event, profile);
        let blended = match event.score {
            Some(semantic) if semantic > 0.0 => {
                semantic * SEMANTIC_BLEND + preference * (1.0 - SEMANTIC_BLEND)
            }
            _ => preference,
        };
        event.match_score = Some(blended);
        event.match_tier = Some(match_tier(blended));
    }

    results.sort_by(|a, b| {
        let a_score = a.match_score.unwrap_or(0.0);
        let b_score = b.match_score.unwrap_or(0.0);
        b_score
            .partial_cmp(&a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn event(city: Option<&str>, language: &str, cats: &[&str], remote: Option<bool>) -> EventSearchResult {
        EventSearchResult {
            id: Uuid::new_v4(),
            title: "Event".to_string(),
            city: city.map(String::from),
            country: Some("UA".to_string()),
            language: language.to_string(),
            is_remote: remote,
            source_url: "https://example.com".to_string(),
            posted_at: None,
            occurs_from: None,
            occurs_to: None,
            deadline_at: None,
            status: "active".to_string(),
            categories_slugs: cats.iter().map(|s| s.to_string()).collect(),
            score: None,
            match_score: None,
            match_tier: None,
        }
    }

    fn profile() -> Profile {
        Profile {
            city: Some("Київ".to_string()),
            languages: vec!["uk".to_string()],
            preferred_categories: vec!["workshop".to_string()],
            remote_preference: Some(RemotePreference::Remote),
        }
    }

    #[test]
    fn perfect_match_scores_one() {
        let e = event(Some("Київ"), "uk", &["workshop"], Some(true));
        assert!((profile_score(&e, &profile()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn total_mismatch_scores_zero() {
        let e = event(Some("Львів"), "en", &["concert"], Some(false));
        assert!(profile_score(&e, &profile()).abs() < 1e-6);
    }

    #[test]
    fn city_match_is_case_insensitive() {
        let mut p = profile();
        p.languages.clear();
        p.preferred_categories.clear();
        p.remote_preference = None;
        let e = event(Some("КИЇВ".to_lowercase().as_str()), "uk", &[], None);
        assert!((profile_score(&e, &p) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_event_fields_are_neutral_not_penalized() {
        // Event states nothing the profile cares about except language
        let e = event(None, "uk", &[], None);
        let score = profile_score(&e, &profile());
        // Only the language factor applies: 0.2 / 0.2
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_profile_is_neutral() {
        let e = event(Some("Київ"), "uk", &["workshop"], Some(true));
        assert!((profile_score(&e, &Profile::default()) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn any_remote_preference_gives_half_weight() {
        let p = Profile {
            remote_preference: Some(RemotePreference::Any),
            ..Default::default()
        };
        let mut e = event(None, "uk", &[], Some(false));
        e.language = String::new();
        // language factor skipped only when profile has no languages;
        // here profile.languages is empty so only remote counts: 0.1/0.2
        assert!((profile_score(&e, &p) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn onsite_preference_rewards_onsite() {
        let p = Profile {
            remote_preference: Some(RemotePreference::Onsite),
            ..Default::default()
        };
        let onsite = event(None, "uk", &[], Some(false));
        let remote = event(None, "uk", &[], Some(true));
        assert!(profile_score(&onsite, &p) > profile_score(&remote, &p));
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(match_tier(0.95), MatchTier::High);
        assert_eq!(match_tier(0.7), MatchTier::High);
        assert_eq!(match_tier(0.69), MatchTier::Medium);
        assert_eq!(match_tier(0.4), MatchTier::Medium);
        assert_eq!(match_tier(0.39), MatchTier::Low);
    }

    #[test]
    fn blend_uses_semantic_score_when_present() {
        let mut results = vec![event(Some("Київ"), "uk", &["workshop"], Some(true))];
        results[0].score = Some(0.8);
        apply_profile(&mut results, &profile());
        // 0.8 * 0.7 + 1.0 * 0.3 = 0.86
        let blended = results[0].match_score.unwrap();
        assert!((blended - 0.86).abs() < 1e-5);
        assert_eq!(results[0].match_tier, Some(MatchTier::High));
    }

    #[test]
    fn apply_profile_sorts_descending() {
        let mut good = event(Some("Київ"), "uk", &["workshop"], Some(true));
        good.score = Some(0.5);
        let mut bad = event(Some("Львів"), "en", &["concert"], Some(false));
        bad.score = Some(0.9);
        let good_id = good.id;

        let mut results = vec![bad, good];
        apply_profile(&mut results, &profile());
        // good: 0.5*0.7 + 1.0*0.3 = 0.65; bad: 0.9*0.7 + 0*0.3 = 0.63
        assert_eq!(results[0].id, good_id);
        assert!(results[0].match_score >= results[1].match_score);
    }

    #[test]
    fn all_results_get_score_and_tier() {
        let mut results = vec![
            event(None, "uk", &[], None),
            event(Some("Одеса"), "en", &["concert"], Some(true)),
        ];
        apply_profile(&mut results, &profile());
        assert!(results.iter().all(|r| r.match_score.is_some()));
        assert!(results.iter().all(|r| r.match_tier.is_some()));
    }
}
