use serde_json::Value;
use tracing::warn;

use super::dto::{Recipe, RecipeResponse};
use crate::gemini::{Completions, GenerateContentResponse, QueueError};
use crate::plans::normalizer::{coerce_list, coerce_number, coerce_text, parse_lenient};

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error(transparent)]
    Completion(#[from] QueueError),
    #[error("the recipe could not be read from the model response")]
    Unreadable,
}

pub fn build_recipe_prompt(dish: &str, cuisine: Option<&str>) -> String {
    let style = cuisine
        .map(|c| format!(" in {c} style"))
        .unwrap_or_default();
    format!(
        r#"Generate a detailed recipe for the Indian dish "{dish}"{style}.
Provide the information in JSON format with the following structure:
{{
  "ingredients": ["detailed list of ingredients with quantities"],
  "steps": ["step by step cooking instructions"],
  "cookingTime": "total time including prep",
  "servings": 4,
  "difficulty": "Easy/Medium/Hard"
}}

Make sure to:
1. Include precise measurements for ingredients
2. Break down steps into clear, manageable instructions
3. Include any special tips or techniques
4. Mention cooking temperatures where applicable
5. Note any alternative ingredients or methods"#
    )
}

pub async fn fetch_recipe(
    completions: &Completions,
    dish: &str,
    cuisine: Option<&str>,
) -> Result<RecipeResponse, RecipeError> {
    let request = completions.recipe_request(build_recipe_prompt(dish, cuisine));
    let completion = completions
        .complete(request, |r| recipe_from(r).is_some())
        .await?;
    let recipe = recipe_from(&completion.response).ok_or_else(|| {
        warn!(%dish, "unreadable recipe response");
        RecipeError::Unreadable
    })?;
    Ok(RecipeResponse {
        dish: dish.to_string(),
        cuisine: cuisine.map(str::to_string),
        recipe,
        cached: completion.cached,
    })
}

fn recipe_from(response: &GenerateContentResponse) -> Option<Recipe> {
    response.text().and_then(parse_lenient).and_then(|v| read_recipe(&v))
}

/// Needs at least one ingredient and one step.
fn read_recipe(v: &Value) -> Option<Recipe> {
    let ingredients = v.get("ingredients").map(coerce_list).unwrap_or_default();
    let steps = v.get("steps").map(coerce_list).unwrap_or_default();
    if ingredients.is_empty() || steps.is_empty() {
        return None;
    }
    Some(Recipe {
        ingredients,
        steps,
        cooking_time: v.get("cookingTime").and_then(coerce_text),
        servings: v
            .get("servings")
            .and_then(coerce_number)
            .filter(|n| *n >= 1.0)
            .map(|n| n.round() as u32),
        difficulty: v.get("difficulty").and_then(coerce_text),
    })
}
