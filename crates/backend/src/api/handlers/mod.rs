// UseCase handlers
pub mod usecases;
