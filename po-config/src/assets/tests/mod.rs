mod source_test;
mod store_test;

use assertables::*;
use po_testutils::*;
use rstest::*;

use super::*;
use crate::prelude::*;
