pub(crate) mod fence;
