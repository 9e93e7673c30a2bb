// Cross-module tests: end-to-end scenarios and structural properties

mod scenarios;
