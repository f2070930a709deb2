use ctwallet_storage::Column;

#[test]
fn column_index_matches_position() {
    for (idx, column) in Column::ALL.iter().copied().enumerate() {
        assert_eq!(column.index(), idx, "index mismatch for {column:?}");
    }
    let names: std::collections::HashSet<_> = Column::ALL.iter().map(|c| c.as_str()).collect();
    assert_eq!(names.len(), Column::ALL.len());
}
