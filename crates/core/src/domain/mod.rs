pub mod answer;
pub mod puzzle;
