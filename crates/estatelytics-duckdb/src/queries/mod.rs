pub mod funnel_counts;
