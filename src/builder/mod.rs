pub mod facet_builder;
