use std::fmt::Write;

use super::dto::{CuisinePreference, NutritionInfo, UserProfile};

const REQUIREMENTS: &str = r#"
STRICT REQUIREMENTS:
1. ALL meals MUST be authentic Indian dishes only
2. NO meal repetition within the entire plan
3. Include a diverse mix of dishes from different Indian regions"#;

const MEAL_GUIDANCE: &str = r#"
MEAL-SPECIFIC REQUIREMENTS:

Breakfast Options (include items like):
- South Indian: Idli, Dosa, Uttapam, Upma, Medu Vada
- North Indian: Paratha, Poha, Chole Bhature
- West Indian: Dhokla, Thepla
- East Indian: Luchi-Aloor Dom, Puri-Sabzi

Lunch Thali Requirements:
- Main: Roti/Rice varieties (eg: Phulka, Jeera Rice)
- Dal varieties (eg: Dal Tadka, Sambar, Dal Makhani)
- Sabzi/Curry (eg: Palak Paneer, Baingan Bharta)
- Side dishes (eg: Raita, Pickle, Papad)

Dinner Requirements (lighter but nutritious):
- Light curries with roti/rice
- Mixed vegetable dishes
- Healthy protein options
- Regional specialties in lighter versions

Traditional Indian Snacks:
- Steamed options: Dhokla, Idli
- Chaats: Bhel Puri, Sev Puri, Dahi Puri
- Fried items (in moderation): Samosa, Pakora
- Healthy options: Sprouts Chaat, Makhana

For each day, provide detailed descriptions of breakfast, lunch thali components, dinner, and snacks.
Include estimated nutrition info (calories, protein, carbs, fat) for each day.
Add recommendations focusing on balanced Indian diet principles and the user's profile.
"#;

/// Builds the plan prompt sent to the model. The JSON skeleton at the end is
/// the shape the normalizer expects back.
pub fn build_plan_prompt(profile: &UserProfile) -> String {
    let mut out = String::with_capacity(4096);
    let allergies = if profile.allergies.is_empty() {
        "None".to_string()
    } else {
        profile.allergies.join(", ")
    };

    let _ = write!(
        out,
        "Generate a personalized meal plan for {days} days based on the following information:\n\
         - Age: {age}\n\
         - Height: {height} cm\n\
         - Weight: {weight} kg\n\
         - Dietary preference: {diet}\n\
         - Cuisine preference: {cuisine}\n\
         - Allergies: {allergies}",
        days = profile.days,
        age = profile.age,
        height = profile.height,
        weight = profile.weight,
        diet = profile.dietary_preference,
        cuisine = profile.cuisine_preference.as_str(),
    );

    if let Some(targets) = profile.macro_targets() {
        out.push_str(
            "\n\nCRITICAL INSTRUCTION - EXACT NUTRITION VALUES REQUIRED\n\n\
             The user has specified the following EXACT nutrition targets:",
        );
        for (label, unit, value) in [
            ("Total Calories", "kcal", targets.calories),
            ("Protein", "grams", targets.protein),
            ("Carbohydrates", "grams", targets.carbs),
            ("Fat", "grams", targets.fat),
            ("Fiber", "grams", targets.fiber),
        ] {
            if let Some(v) = value {
                let _ = write!(out, "\n- {label}: EXACTLY {v} {unit} per day (MANDATORY)");
            }
        }
        out.push_str(
            "\n\nEach day's nutrition values MUST MATCH THESE EXACT VALUES. \
             Balance meals and adjust portion sizes to hit the daily targets, \
             and do not deviate from them.",
        );
    }

    out.push_str(cuisine_section(&profile.cuisine_preference));
    out.push('\n');
    out.push_str(REQUIREMENTS);
    if profile.use_nutrition_input {
        out.push_str(
            "\n4. EXACT NUTRITION VALUES as specified by the user - this overrides all other considerations",
        );
    }
    out.push('\n');
    out.push_str(MEAL_GUIDANCE);
    out.push_str(&response_skeleton(profile));
    out
}

fn cuisine_section(c: &CuisinePreference) -> &'static str {
    match c {
        CuisinePreference::NorthIndian => {
            "\n\nFocus on traditional North Indian dishes like:\n\
             - Breakfast: Paratha, Poha, Chole Bhature, Aloo Puri\n\
             - Lunch: Roti, Dal Makhani, Paneer Butter Masala, Rajma Chawal\n\
             - Dinner: Chana Masala, Jeera Rice, Kadhi Pakora\n\
             - Snacks: Samosa, Pakora, Chaat"
        }
        CuisinePreference::SouthIndian => {
            "\n\nFocus on traditional South Indian dishes like:\n\
             - Breakfast: Idli, Dosa, Upma, Pongal\n\
             - Lunch: Rice, Sambar, Rasam, Avial, Thoran\n\
             - Dinner: Appam, Stew, Puttu, Kadala Curry\n\
             - Snacks: Medu Vada, Bonda, Murukku"
        }
        CuisinePreference::Both => {
            "\n\nInclude a mix of both North and South Indian dishes:\n\
             - North Indian: Roti, Dal Makhani, Paneer dishes, Paratha\n\
             - South Indian: Idli, Dosa, Sambar, Rasam\n\
             - Common dishes: Rice varieties, Vegetable curries, Raita\n\
             - Snacks: Mix of North and South Indian snacks"
        }
        CuisinePreference::Other(_) => "",
    }
}

fn response_skeleton(profile: &UserProfile) -> String {
    let mut n = NutritionInfo::default();
    if let Some(t) = profile.macro_targets() {
        t.apply(&mut n);
    }
    let fiber = n
        .fiber
        .map(|f| format!(",\n            \"fiber\": {f}"))
        .unwrap_or_default();

    format!(
        r#"
IMPORTANT: Your response MUST be a valid JSON object with the following structure. Do not include any text before or after the JSON:
{{
  "mealPlans": [
    {{
      "day": 1,
      "meals": {{
        "breakfast": "Detailed description of Indian breakfast with main and side items",
        "lunch": "Complete thali description listing all components (roti/rice, dal, sabzi, sides)",
        "dinner": "Light Indian dinner description with all components",
        "snacks": ["Morning Indian snack", "Evening Indian snack"]
      }},
      "nutritionInfo": {{
            "calories": {calories},
            "protein": {protein},
            "carbs": {carbs},
            "fat": {fat}{fiber}
      }}
    }}
  ],
  "recommendations": [
    "Recommendation about Indian diet principles",
    "Recommendation about meal timings and combinations",
    "Recommendation about incorporating regional varieties"
  ]
}}

MOST IMPORTANT: Return ONLY valid JSON that exactly matches this structure. No text explanations before or after the JSON."#,
        calories = n.calories,
        protein = n.protein,
        carbs = n.carbs,
        fat = n.fat,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::dto::fixtures::{profile, with_macros};

    #[test]
    fn includes_profile_facts_and_cuisine_section() {
        let p = profile(5, CuisinePreference::SouthIndian);
        let prompt = build_plan_prompt(&p);
        assert!(prompt.starts_with("Generate a personalized meal plan for 5 days"));
        assert!(prompt.contains("- Age: 32"));
        assert!(prompt.contains("- Allergies: peanuts"));
        assert!(prompt.contains("- Cuisine preference: south-indian"));
        assert!(prompt.contains("Pongal"));
        assert!(!prompt.contains("Chole Bhature, Aloo Puri"));
    }

    #[test]
    fn empty_allergies_read_none() {
        let mut p = profile(1, CuisinePreference::Both);
        p.allergies.clear();
        assert!(build_plan_prompt(&p).contains("- Allergies: None"));
    }

    #[test]
    fn macro_lines_only_when_opted_in() {
        let plain = build_plan_prompt(&profile(2, CuisinePreference::NorthIndian));
        assert!(!plain.contains("EXACTLY"));
        assert!(plain.contains("\"calories\": 2000"));
        assert!(!plain.contains("\"fiber\""));

        let targeted = build_plan_prompt(&with_macros(profile(2, CuisinePreference::NorthIndian)));
        assert!(targeted.contains("- Total Calories: EXACTLY 2150 kcal per day (MANDATORY)"));
        assert!(targeted.contains("- Fiber: EXACTLY 32 grams per day (MANDATORY)"));
        assert!(targeted.contains("4. EXACT NUTRITION VALUES"));
        assert!(targeted.contains("\"calories\": 2150"));
        assert!(targeted.contains("\"fiber\": 32"));
    }

    #[test]
    fn unknown_cuisine_is_named_but_gets_no_cuisine_section() {
        let prompt = build_plan_prompt(&profile(1, CuisinePreference::Other("gujarati".into())));
        assert!(prompt.contains("- Cuisine preference: gujarati"));
        assert!(!prompt.contains("Focus on traditional"));
        assert!(!prompt.contains("Include a mix of both"));
    }
}
