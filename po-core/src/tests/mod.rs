mod k8s_test;

use rstest::*;

use super::*;
