#![allow(dead_code)]

pub(crate) mod counting_scheme;

pub(crate) mod logging;

pub(crate) mod scenarios;
