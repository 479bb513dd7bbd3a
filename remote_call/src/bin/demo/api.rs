// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

// The API shared by the demo server and the demo client. Both sides
// expand the same declarations, which is what keeps their signatures in
// agreement.

#![allow(dead_code)]

use std::collections::BTreeMap;

use remote_call::{Reader, WireError, WireRead, WireWrite, Writer};

/// A user-defined payload type; it travels by supplying the two codec
/// impls, field by field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Abc {
    pub s: String,
    pub n: i32,
}

impl WireWrite for Abc {
    fn serialize(&self, w: &mut Writer) {
        self.s.serialize(w);
        self.n.serialize(w);
    }
}

impl WireRead for Abc {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            s: String::deserialize(r)?,
            n: i32::deserialize(r)?,
        })
    }
}

remote_call::remote_interface! {
    pub interface ITest {
        fn Method1(&self);
        fn Method2(&self, s: &mut String, c: char) -> i32;
        fn Label(&self) -> String;
    }
}

remote_call::remote_functions! {
    fn Func1(s: &mut String, c: char) -> i32;
    fn Func2(v: &mut Vec<Abc>, abc: Abc) -> (i32, String);
    fn Func3(m: &mut BTreeMap<i32, String>);
    fn TestClassFactory(label: String) -> ITest;
}
