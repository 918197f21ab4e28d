mod render_test;

use assertables::*;
use rstest::*;
