pub mod handlers;
pub mod job_descriptions;
pub mod resumes;
pub mod validation;
