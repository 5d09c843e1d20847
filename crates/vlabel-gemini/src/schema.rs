//! Per-level structured-output contracts and instructions.
//!
//! Each aggregation level asks for the same shape: five named facets, three
//! natural-language search queries each. The response schema pins the shape
//! so the service returns machine-checkable JSON.

use serde_json::{json, Value};

use vlabel_models::{WorkUnitKind, ITEMS_PER_FIELD};

/// Response schema for one level, in the service's schema dialect.
pub fn response_schema(kind: WorkUnitKind) -> Value {
    let mut properties = serde_json::Map::new();
    for field in kind.query_fields() {
        properties.insert(
            (*field).to_string(),
            json!({
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": ITEMS_PER_FIELD,
                "maxItems": ITEMS_PER_FIELD,
            }),
        );
    }
    json!({
        "type": "OBJECT",
        "properties": Value::Object(properties),
        "required": kind.query_fields(),
    })
}

/// Sampling rate hint for the level's video: dense for short segments,
/// sparse for whole episodes and series.
pub fn video_fps(kind: WorkUnitKind) -> f64 {
    match kind {
        WorkUnitKind::Segment => 5.0,
        WorkUnitKind::Episode => 2.0,
        WorkUnitKind::Series => 1.0,
    }
}

/// Instruction text for the level.
pub fn instruction(kind: WorkUnitKind) -> &'static str {
    match kind {
        WorkUnitKind::Segment => SEGMENT_INSTRUCTION,
        WorkUnitKind::Episode => EPISODE_INSTRUCTION,
        WorkUnitKind::Series => SERIES_INSTRUCTION,
    }
}

const SEGMENT_INSTRUCTION: &str = "\
You are given a short clip from an animated episode. Write the natural-language \
search queries a viewer would say when trying to find this clip from memory.

Cover five facets, three queries each:
1. visual_saliency - the most striking visual features: lighting shifts, color, \
framing, camera moves, effects.
2. character_emotion - facial expressions, posture, emotional reactions.
3. action_behavior - clearly visible actions, interactions, physical behavior.
4. dialogue - memorable lines, shouts or narration, quoted or paraphrased.
5. symbolic_scene - symbolically or emotionally pivotal imagery.

Queries must read like a real viewer recalling the clip: concrete, vivid and \
specific, not plot summaries.";

const EPISODE_INSTRUCTION: &str = "\
You are given one full episode. Write the natural-language search queries a \
viewer would say when trying to find this episode from memory.

Cover five facets, three queries each:
1. main_plot - the episode's central storyline or theme event.
2. turning_point - the clearest narrative or emotional reversal.
3. relationship_change - how relationships between characters shift.
4. episode_mood - the episode's overall mood or pacing, in a viewer's words.
5. notable_scene - the scene viewers are most likely to remember.

Queries should sound like someone searching from a fuzzy impression: casual, \
concrete and vivid, not a synopsis.";

const SERIES_INSTRUCTION: &str = "\
You are given a whole series sampled at low frame rate. Write the \
natural-language search queries a viewer would say when trying to find this \
series from memory.

Cover five facets, three queries each:
1. narrative_arc - the overall story flow across the series.
2. character_appearance - distinctive looks, outfits or signature traits of \
the main characters.
3. character_development - how characters grow or relationships change across \
the series.
4. theme - the ideas the series is about.
5. visual_emotional_impression - overall art style, palette and the feeling \
it leaves.

Queries should be what a viewer half-remembering the show would type: \
specific, sensory and personal, not a plot recap.";
