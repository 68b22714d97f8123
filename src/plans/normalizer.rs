//! Turns a loosely structured model answer into typed day plans.
//!
//! [`decide`] picks one of two strategies: a structured parse of the JSON the
//! model was asked for, or fallback synthesis when the text is missing,
//! truncated or unusable. Both paths go through the same post-validation, so
//! callers always get `profile.days` well-formed days numbered from 1.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::dto::{MealPlan, Meals, NutritionInfo, PlanSource, UserProfile};
use super::fallback;
use crate::gemini::GenerateContentResponse;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?").unwrap();
    static ref OBJECT_SPAN: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",(\s*[\]}])").unwrap();
    static ref LEADING_NUMBER: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
}

/// A reply known to stop mid-sentence contains both phrases.
const TRUNCATION_FINGERPRINT: [&str; 2] = [
    "levels. Include a source of healthy fats in each meal",
    "Explore the diverse regional cuisines of India",
];

const DEFAULT_BREAKFAST: &str = "Balanced Indian breakfast";
const DEFAULT_LUNCH: &str = "Nutritious Indian lunch thali";
const DEFAULT_DINNER: &str = "Light and healthy Indian dinner";
const DEFAULT_SNACK: &str = "Healthy evening snack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    MissingText,
    Truncated,
    Unparseable,
    NoMealPlans,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Object holding a non-empty `mealPlans` array.
    StructuredParse(Map<String, Value>),
    FallbackSynthesis(FallbackReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub meal_plans: Vec<MealPlan>,
    pub recommendations: Vec<String>,
    pub source: PlanSource,
    pub fallback_reason: Option<FallbackReason>,
}

/// Day as read from the model, before defaults are filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftDay {
    pub day: Option<u32>,
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
    pub snacks: Vec<String>,
    pub nutrition: Option<NutritionInfo>,
}

impl From<MealPlan> for DraftDay {
    fn from(p: MealPlan) -> Self {
        Self {
            day: Some(p.day),
            breakfast: Some(p.meals.breakfast),
            lunch: Some(p.meals.lunch),
            dinner: Some(p.meals.dinner),
            snacks: p.meals.snacks,
            nutrition: p.nutrition_info,
        }
    }
}

pub fn normalize<R: Rng + ?Sized>(
    response: &GenerateContentResponse,
    profile: &UserProfile,
    rng: &mut R,
) -> Normalized {
    normalize_text(response.text(), profile, rng)
}

pub fn normalize_text<R: Rng + ?Sized>(
    text: Option<&str>,
    profile: &UserProfile,
    rng: &mut R,
) -> Normalized {
    match decide(text) {
        Strategy::StructuredParse(doc) => {
            let drafts = extract_days(&doc);
            let recommendations =
                extract_recommendations(&doc).unwrap_or_else(default_recommendations);
            debug!(days = drafts.len(), "parsed meal plans from completion");
            Normalized {
                meal_plans: finalize(drafts, profile, rng),
                recommendations,
                source: PlanSource::Model,
                fallback_reason: None,
            }
        }
        Strategy::FallbackSynthesis(reason) => {
            warn!(?reason, days = profile.days, "using synthesized fallback plan");
            synthesized(profile, rng, reason)
        }
    }
}

/// Fallback plan for when no completion could be obtained at all.
pub fn fallback_plan<R: Rng + ?Sized>(profile: &UserProfile, rng: &mut R) -> Normalized {
    synthesized(profile, rng, FallbackReason::MissingText)
}

fn synthesized<R: Rng + ?Sized>(
    profile: &UserProfile,
    rng: &mut R,
    reason: FallbackReason,
) -> Normalized {
    let drafts = fallback::synthesize(profile, rng)
        .into_iter()
        .map(DraftDay::from)
        .collect();
    Normalized {
        meal_plans: finalize(drafts, profile, rng),
        recommendations: fallback::recommendations(),
        source: PlanSource::Fallback,
        fallback_reason: Some(reason),
    }
}

pub fn decide(text: Option<&str>) -> Strategy {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Strategy::FallbackSynthesis(FallbackReason::MissingText);
    };
    if is_truncated(text) {
        return Strategy::FallbackSynthesis(FallbackReason::Truncated);
    }
    let Some(value) = parse_lenient(text) else {
        return Strategy::FallbackSynthesis(FallbackReason::Unparseable);
    };
    match into_plan_document(value) {
        Some(doc) => Strategy::StructuredParse(doc),
        None => Strategy::FallbackSynthesis(FallbackReason::NoMealPlans),
    }
}

/// Known cut-off phrases anywhere in the reply, or unbalanced braces in the
/// JSON part of it. Prose around the object is not inspected.
pub fn is_truncated(text: &str) -> bool {
    TRUNCATION_FINGERPRINT.iter().all(|p| text.contains(p))
        || !braces_balanced(&json_candidate(text))
}

/// Fences stripped, then the outermost `{...}` span if there is one.
fn json_candidate(text: &str) -> String {
    let cleaned = CODE_FENCE.replace_all(text, "");
    let cleaned = cleaned.trim();
    OBJECT_SPAN
        .find(cleaned)
        .map_or(cleaned, |m| m.as_str())
        .to_string()
}

/// Brace depth from the first `{`, ignoring braces inside JSON strings.
/// An unterminated string or an unclosed object means the reply was cut off.
pub fn braces_balanced(text: &str) -> bool {
    let Some(start) = text.find('{') else {
        return true;
    };
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in text[start..].chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !in_string
}

/// Strips code fences, isolates the outermost `{...}` and parses it, retrying
/// once with trailing commas removed.
pub fn parse_lenient(text: &str) -> Option<Value> {
    let candidate = json_candidate(text);

    match serde_json::from_str::<Value>(&candidate) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "completion is not valid JSON; removing trailing commas");
            let repaired = TRAILING_COMMA.replace_all(&candidate, "$1");
            serde_json::from_str::<Value>(&repaired)
                .map_err(|e| warn!(error = %e, "completion could not be repaired"))
                .ok()
        }
    }
}

/// Accepts `{ "mealPlans": [...] }`, or a lone day object which gets wrapped.
fn into_plan_document(value: Value) -> Option<Map<String, Value>> {
    let Value::Object(mut obj) = value else {
        return None;
    };
    let has_plans = obj
        .get("mealPlans")
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty());
    if has_plans {
        return Some(obj);
    }
    if ["meals", "day", "nutritionInfo"]
        .iter()
        .any(|k| obj.contains_key(*k))
    {
        let recommendations = obj.remove("recommendations");
        let mut doc = Map::new();
        doc.insert("mealPlans".into(), Value::Array(vec![Value::Object(obj)]));
        if let Some(r) = recommendations {
            doc.insert("recommendations".into(), r);
        }
        return Some(doc);
    }
    None
}

fn extract_days(doc: &Map<String, Value>) -> Vec<DraftDay> {
    doc.get("mealPlans")
        .and_then(Value::as_array)
        .map(|days| days.iter().map(draft_from_value).collect())
        .unwrap_or_default()
}

fn draft_from_value(v: &Value) -> DraftDay {
    let meals = v.get("meals");
    let meal = |key: &str| meals.and_then(|m| m.get(key)).and_then(coerce_text);
    DraftDay {
        day: v.get("day").and_then(coerce_number).and_then(|d| {
            (d >= 1.0 && d.fract() == 0.0 && d <= u32::MAX as f64).then_some(d as u32)
        }),
        breakfast: meal("breakfast"),
        lunch: meal("lunch"),
        dinner: meal("dinner"),
        snacks: meals
            .and_then(|m| m.get("snacks"))
            .map(coerce_list)
            .unwrap_or_default(),
        nutrition: v.get("nutritionInfo").and_then(coerce_nutrition),
    }
}

pub(crate) fn coerce_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(coerce_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => n.to_string(),
        Value::Object(o) => o
            .values()
            .filter_map(coerce_text)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };
    (!s.is_empty()).then_some(s)
}

pub(crate) fn coerce_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(coerce_text).collect(),
        other => coerce_text(other).into_iter().collect(),
    }
}

pub(crate) fn coerce_number(v: &Value) -> Option<f64> {
    let n: f64 = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => LEADING_NUMBER.find(s)?.as_str().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_nutrition(v: &Value) -> Option<NutritionInfo> {
    let obj = v.as_object()?;
    let defaults = NutritionInfo::default();
    let field = |k: &str| obj.get(k).and_then(coerce_number);
    Some(NutritionInfo {
        calories: field("calories").unwrap_or(defaults.calories),
        protein: field("protein").unwrap_or(defaults.protein),
        carbs: field("carbs").unwrap_or(defaults.carbs),
        fat: field("fat").unwrap_or(defaults.fat),
        fiber: field("fiber"),
    })
}

fn extract_recommendations(doc: &Map<String, Value>) -> Option<Vec<String>> {
    let recs = coerce_list(doc.get("recommendations")?);
    (!recs.is_empty()).then_some(recs)
}

fn default_recommendations() -> Vec<String> {
    [
        "Stay hydrated by drinking 8-10 glasses of water daily",
        "Include a variety of colorful vegetables in your diet",
        "Try to maintain consistent meal timings for better digestion",
        "Consider including fermented foods like yogurt for gut health",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Post-validation shared by both strategies.
///
/// Orders days by the number the model gave (array position when missing),
/// renumbers them 1..=n, keeps at most `profile.days` and pads short plans with
/// synthesized days. Empty meals get defaults; explicit macro targets always
/// win over any estimate.
pub fn finalize<R: Rng + ?Sized>(
    drafts: Vec<DraftDay>,
    profile: &UserProfile,
    rng: &mut R,
) -> Vec<MealPlan> {
    let mut keyed: Vec<(u32, DraftDay)> = drafts
        .into_iter()
        .enumerate()
        .map(|(i, d)| (d.day.unwrap_or(i as u32 + 1), d))
        .collect();
    keyed.sort_by_key(|(k, _)| *k);
    keyed.truncate(profile.days as usize);

    let targets = profile.macro_targets();
    let mut plans: Vec<MealPlan> = keyed
        .into_iter()
        .enumerate()
        .map(|(i, (_, d))| {
            let snacks = if d.snacks.is_empty() {
                vec![DEFAULT_SNACK.to_string()]
            } else {
                d.snacks
            };
            MealPlan {
                day: i as u32 + 1,
                meals: Meals {
                    breakfast: non_empty(d.breakfast, DEFAULT_BREAKFAST),
                    lunch: non_empty(d.lunch, DEFAULT_LUNCH),
                    dinner: non_empty(d.dinner, DEFAULT_DINNER),
                    snacks,
                },
                nutrition_info: Some(d.nutrition.unwrap_or_default()),
            }
        })
        .collect();

    for day in plans.len() as u32 + 1..=profile.days {
        plans.push(fallback::day_plan(profile, day, rng));
    }

    if let Some(targets) = targets {
        for plan in &mut plans {
            targets.apply(plan.nutrition_info.get_or_insert_with(NutritionInfo::default));
        }
    }

    plans
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
