//! NewsBrief - A Low-Bandwidth News Briefing Generator
//!
//! This crate fetches RSS, Atom, podcast, and scraped web sources, summarizes
//! the collected articles with the Claude API, and writes daily briefings as
//! static markdown (and optionally HTML) files.

pub mod briefing;
pub mod config;
pub mod fetcher;
pub mod summarizer;
