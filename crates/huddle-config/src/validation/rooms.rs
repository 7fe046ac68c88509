//! Room default and seed validation.

use std::collections::HashSet;

use crate::schema::HuddleConfig;

use super::helpers::validate_range;

const MAX_CAPACITY: u32 = 1000;

pub(crate) fn validate_rooms(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "rooms.default_capacity",
        config.rooms.default_capacity,
        1,
        MAX_CAPACITY,
    );

    let mut seen = HashSet::new();
    for (i, seed) in config.rooms.seed.iter().enumerate() {
        if seed.name.trim().is_empty() {
            errors.push(format!("rooms.seed[{i}].name must not be empty"));
        }
        if let Some(capacity) = seed.capacity {
            validate_range(
                errors,
                &format!("rooms.seed[{i}].capacity"),
                capacity,
                1,
                MAX_CAPACITY,
            );
        }
        if let Some(id) = &seed.id {
            if !seen.insert(id.as_str()) {
                errors.push(format!("rooms.seed[{i}].id = {id} is duplicated"));
            }
        }
    }
}
