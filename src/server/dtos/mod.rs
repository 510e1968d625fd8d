pub mod health_dto;
pub mod source_dto;
