//! Startup seeding of the scheduling store from a JSON doctor roster.

use anyhow::{Context, Result};
use hakim_core::{schedule::NewDoctor, store::SchedulingStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads the doctors in the given JSON file into the store. Returns the
/// number of doctors inserted.
pub async fn seed_store(store: &Arc<dyn SchedulingStore>, path: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let doctors: Vec<NewDoctor> =
        serde_json::from_str(&raw).context("Seed file is not a valid doctor roster")?;

    let count = doctors.len();
    for doctor in doctors {
        let inserted = store.insert_doctor(doctor).await?;
        info!(doctor = %inserted.name, id = %inserted.id, "Seeded doctor");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hakim_core::store::MemoryStore;

    const SAMPLE: &str = r#"[
        {
            "name": "Dr. Alice Johnson",
            "specialization": "General Dentist",
            "availability": [
                {"day_of_week": 0, "time_slots": [
                    {"start_time": "09:00:00", "end_time": "12:00:00"},
                    {"start_time": "13:00:00", "end_time": "17:00:00"}
                ]}
            ]
        },
        {
            "name": "Dr. Bob Smith",
            "specialization": "Oral Surgeon",
            "availability": [
                {"day_of_week": 1, "time_slots": [
                    {"start_time": "08:00:00", "end_time": "16:00:00"}
                ]}
            ]
        }
    ]"#;

    #[tokio::test]
    async fn seeds_doctors_from_json() {
        let store: Arc<dyn SchedulingStore> = Arc::new(MemoryStore::new());

        let dir = std::env::temp_dir().join(format!("hakim-seed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("doctors.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let count = seed_store(&store, &path).await.unwrap();
        assert_eq!(count, 2);

        let doctors = store.list_doctors().await.unwrap();
        assert_eq!(doctors.len(), 2);
        assert_eq!(doctors[0].name, "Dr. Alice Johnson");
        assert_eq!(doctors[0].availability[0].time_slots.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn rejects_invalid_seed_data() {
        let store: Arc<dyn SchedulingStore> = Arc::new(MemoryStore::new());

        let dir = std::env::temp_dir().join(format!("hakim-seed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("doctors.json");
        // Inverted time slot must fail the schedule invariant.
        std::fs::write(
            &path,
            r#"[{"name":"Dr. X","specialization":"Endodontics","availability":[
                {"day_of_week":0,"time_slots":[{"start_time":"12:00:00","end_time":"09:00:00"}]}
            ]}]"#,
        )
        .unwrap();

        assert!(seed_store(&store, &path).await.is_err());
        assert!(store.list_doctors().await.unwrap().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
