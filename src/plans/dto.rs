use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The three cuisines with their own templates; anything else is kept as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CuisinePreference {
    NorthIndian,
    SouthIndian,
    Both,
    Other(String),
}

impl CuisinePreference {
    pub fn as_str(&self) -> &str {
        match self {
            CuisinePreference::NorthIndian => "north-indian",
            CuisinePreference::SouthIndian => "south-indian",
            CuisinePreference::Both => "both",
            CuisinePreference::Other(raw) => raw,
        }
    }
}

impl From<String> for CuisinePreference {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "north-indian" => CuisinePreference::NorthIndian,
            "south-indian" => CuisinePreference::SouthIndian,
            "both" => CuisinePreference::Both,
            _ => CuisinePreference::Other(raw),
        }
    }
}

impl From<CuisinePreference> for String {
    fn from(c: CuisinePreference) -> Self {
        match c {
            CuisinePreference::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// Dietary profile submitted with a plan request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub age: u32,
    /// cm
    pub height: f64,
    /// kg
    pub weight: f64,
    pub dietary_preference: String,
    pub cuisine_preference: CuisinePreference,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub use_nutrition_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("age must be between 18 and 100")]
    Age,
    #[error("height must be between 100 and 250 cm")]
    Height,
    #[error("weight must be between 30 and 300 kg")]
    Weight,
    #[error("days must be between 1 and 30")]
    Days,
    #[error("{0} must be a positive number")]
    MacroTarget(&'static str),
}

impl UserProfile {
    pub const MAX_DAYS: u32 = 30;

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(18..=100).contains(&self.age) {
            return Err(ProfileError::Age);
        }
        if !(100.0..=250.0).contains(&self.height) {
            return Err(ProfileError::Height);
        }
        if !(30.0..=300.0).contains(&self.weight) {
            return Err(ProfileError::Weight);
        }
        if !(1..=Self::MAX_DAYS).contains(&self.days) {
            return Err(ProfileError::Days);
        }
        if self.use_nutrition_input {
            for (name, value) in [
                ("calories", self.calories),
                ("protein", self.protein),
                ("fat", self.fat),
                ("carbs", self.carbs),
                ("fiber", self.fiber),
            ] {
                if let Some(v) = value {
                    if !v.is_finite() || v <= 0.0 {
                        return Err(ProfileError::MacroTarget(name));
                    }
                }
            }
        }
        Ok(())
    }

    /// Macro targets that must override any estimate, if the user opted in.
    pub fn macro_targets(&self) -> Option<MacroTargets> {
        self.use_nutrition_input.then_some(MacroTargets {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            fiber: self.fiber,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroTargets {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
}

impl MacroTargets {
    pub fn apply(&self, n: &mut NutritionInfo) {
        if let Some(v) = self.calories {
            n.calories = v;
        }
        if let Some(v) = self.protein {
            n.protein = v;
        }
        if let Some(v) = self.carbs {
            n.carbs = v;
        }
        if let Some(v) = self.fat {
            n.fat = v;
        }
        if let Some(v) = self.fiber {
            n.fiber = Some(v);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meals {
    pub breakfast: String,
    pub lunch: String,
    pub dinner: String,
    pub snacks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionInfo {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
}

impl Default for NutritionInfo {
    fn default() -> Self {
        Self {
            calories: 2000.0,
            protein: 75.0,
            carbs: 225.0,
            fat: 60.0,
            fiber: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub day: u32,
    pub meals: Meals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_info: Option<NutritionInfo>,
}

/// A generated plan as stored; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlan {
    pub plan_id: String,
    pub user_data: UserProfile,
    pub meal_plans: Vec<MealPlan>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Model,
    Fallback,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub plan: DietPlan,
    pub source: PlanSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanListItem {
    pub plan_id: String,
    pub days: u32,
    pub cuisine_preference: CuisinePreference,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&DietPlan> for PlanListItem {
    fn from(p: &DietPlan) -> Self {
        Self {
            plan_id: p.plan_id.clone(),
            days: p.meal_plans.len() as u32,
            cuisine_preference: p.user_data.cuisine_preference.clone(),
            created_at: p.created_at,
        }
    }
}

/// At most this many plans come back from the recent view.
pub const RECENT_CAP: usize = 10;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent")]
    pub limit: usize,
}
fn default_recent() -> usize { 5 }

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }
