use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn generate_access_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// `student_` followed by six lowercase alphanumerics.
pub fn generate_student_id() -> String {
    format!("student_{}", generate_access_token(6).to_lowercase())
}
