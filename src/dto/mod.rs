pub mod admin_dto;
pub mod exam_dto;
pub mod proctoring_dto;
