mod bindings_test;

use assertables::*;
use po_testutils::*;
use rstest::*;

use super::*;
