pub mod content_extractor;
pub mod executive_summarizer;
pub mod fact_checker;
pub mod report_writer;
pub mod research_analyst;
pub mod research_planner;
pub mod trend_analyst;
