use anyhow::{Context, Result};
use serde_json::Value;

use billet::config::Config;
use billet::models::Gender;
use billet::reconcile::NewTrainee;

use super::{open_engine, print_json};

pub async fn allocate_tag(config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    match engine
        .allocate_tag_number()
        .await
        .context("Tag allocation failed")?
    {
        Some(tag) => println!("Allocated tag {tag}"),
        None => println!("No tags available"),
    }
    Ok(())
}

pub async fn allocate_room(config: &Config, gender: Gender) -> Result<()> {
    let engine = open_engine(config)?;
    match engine
        .allocate_room_with_bed_space(gender)
        .await
        .context("Room lookup failed")?
    {
        Some(room) => println!(
            "Room {} in block {} has a free bed (bed space {})",
            room.room_number, room.room_block, room.bed_space
        ),
        None => println!("No rooms available for {gender} trainees"),
    }
    Ok(())
}

/// Interpret a `--field` value as JSON when it parses, as a string otherwise
fn field_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn register(config: &Config, gender: Gender, fields: Vec<(String, String)>) -> Result<()> {
    let engine = open_engine(config)?;
    let trainee = fields
        .iter()
        .fold(NewTrainee::new(gender), |t, (key, value)| {
            t.with_field(key.clone(), field_value(value))
        });

    let registration = engine
        .register_trainee(trainee)
        .await
        .context("Registration failed")?;
    print_json(&registration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value() {
        assert_eq!(field_value("42"), Value::from(42));
        assert_eq!(field_value("Ada Lovelace"), Value::from("Ada Lovelace"));
        assert_eq!(field_value("true"), Value::Bool(true));
    }
}
